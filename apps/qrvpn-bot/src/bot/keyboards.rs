use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

use crate::models::plan::Plan;

pub const BTN_PAY: &str = "💳 Оплатить";
pub const BTN_TRIAL: &str = "🎁 Пробный период";
pub const BTN_PROFILE: &str = "👤 Профиль";
pub const BTN_SETTINGS: &str = "⚙️ Настройки";
pub const BTN_SUPPORT: &str = "🆘 Поддержка";

pub const CB_SETUP_IOS: &str = "setup_ios";
pub const CB_SETUP_ANDROID: &str = "setup_android";
pub const CB_SETUP_DESKTOP: &str = "setup_desktop";
pub const CB_SHOW_QR: &str = "show_qr";

pub fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(BTN_PAY), KeyboardButton::new(BTN_TRIAL)],
        vec![KeyboardButton::new(BTN_PROFILE), KeyboardButton::new(BTN_SETTINGS)],
        vec![KeyboardButton::new(BTN_SUPPORT)],
    ])
    .resize_keyboard()
}

pub fn plans_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        Plan::ALL
            .iter()
            .map(|plan| vec![InlineKeyboardButton::callback(plan.button_label(), plan.callback_data())])
            .collect::<Vec<_>>(),
    )
}

pub fn support_keyboard(support_url: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "🆘 Написать в поддержку",
        support_url.clone(),
    )]])
}

pub fn settings_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("📱 iOS", CB_SETUP_IOS),
            InlineKeyboardButton::callback("🤖 Android", CB_SETUP_ANDROID),
        ],
        vec![InlineKeyboardButton::callback("💻 Windows / macOS", CB_SETUP_DESKTOP)],
        vec![InlineKeyboardButton::callback("🔳 Мой QR-код", CB_SHOW_QR)],
    ])
}

/// Keyboards handed to the fulfillment flows; they are never inspected there.
#[derive(Debug, Clone)]
pub struct ReplyKeyboards {
    pub support: InlineKeyboardMarkup,
    pub settings: InlineKeyboardMarkup,
}

impl ReplyKeyboards {
    pub fn new(support_url: &Url) -> Self {
        Self {
            support: support_keyboard(support_url),
            settings: settings_keyboard(),
        }
    }
}
