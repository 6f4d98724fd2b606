use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Last QR image delivered to a user. `photo_id` is the Telegram file id,
/// so the image can be resent without the original file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QrAsset {
    pub user_id: i64,
    pub photo_id: String,
    pub pk: String,
}
