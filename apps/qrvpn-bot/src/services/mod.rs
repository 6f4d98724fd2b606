pub mod fulfillment;
pub mod image_pool;
pub mod notification_service;
pub mod subscription_service;
