pub mod asset;
pub mod subscription;
pub mod trial;
pub mod user;

pub use asset::QrAsset;
pub use subscription::{NewSubscription, Subscription};
pub use trial::TrialRecord;
pub use user::BotUser;
