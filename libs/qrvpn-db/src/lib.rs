pub mod db;
pub mod models;
pub mod repositories;
pub mod store;

pub use db::init_db;
pub use sqlx;
pub use store::{AssetStore, Stores, SubscriptionStore, TrialStore, UserStore};
