pub mod asset_repo;
pub mod subscription_repo;
pub mod trial_repo;
pub mod user_repo;

pub use asset_repo::AssetRepository;
pub use subscription_repo::SubscriptionRepository;
pub use trial_repo::TrialRepository;
pub use user_repo::UserRepository;
