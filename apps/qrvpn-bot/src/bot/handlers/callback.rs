use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, LabeledPrice, ParseMode};
use tracing::{error, info, warn};

use crate::bot::keyboards::{CB_SETUP_ANDROID, CB_SETUP_DESKTOP, CB_SETUP_IOS, CB_SHOW_QR};
use crate::bot::outbound::Photo;
use crate::lexicon;
use crate::models::plan::Plan;
use crate::state::AppState;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let user_id = q.from.id.0 as i64;
    // Only private chats reach the bot, so the user id doubles as the chat id.
    let chat_id = ChatId(user_id);

    let Some(data) = q.data else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    if let Some(plan) = Plan::from_callback(&data) {
        bot.answer_callback_query(callback_id).await?;
        let prices = vec![LabeledPrice {
            label: plan.title().to_string(),
            amount: plan.price_minor(),
        }];
        let mut invoice = bot.send_invoice(
            chat_id,
            plan.title(),
            lexicon::invoice_description(plan.title(), plan.days()),
            plan.to_payload_string(),
            "RUB",
            prices,
        );
        invoice.provider_token = Some(state.config.payment_provider_token.clone());
        invoice.await?;
        info!("Invoice for {} sent to user {}", plan.code(), user_id);
        return Ok(());
    }

    match data.as_str() {
        CB_SETUP_IOS | CB_SETUP_ANDROID | CB_SETUP_DESKTOP => {
            bot.answer_callback_query(callback_id).await?;
            let text = match data.as_str() {
                CB_SETUP_IOS => lexicon::SETUP_IOS,
                CB_SETUP_ANDROID => lexicon::SETUP_ANDROID,
                _ => lexicon::SETUP_DESKTOP,
            };
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        CB_SHOW_QR => {
            bot.answer_callback_query(callback_id).await?;
            match state.stores.assets.find(user_id).await {
                Ok(Some(asset)) if !asset.photo_id.is_empty() => {
                    let caption = lexicon::qr_caption(&asset.pk);
                    if let Err(e) = state
                        .outbox
                        .send_photo(chat_id, Photo::Cached(asset.photo_id), &caption, &state.keyboards.settings)
                        .await
                    {
                        error!("Failed to resend QR to user {}: {:#}", user_id, e);
                    }
                }
                Ok(_) => {
                    bot.send_message(chat_id, lexicon::NO_QR_YET).await?;
                }
                Err(e) => {
                    error!("Failed to load QR asset of user {}: {:#}", user_id, e);
                    bot.send_message(chat_id, lexicon::FULFILLMENT_FAILED)
                        .reply_markup(state.keyboards.support.clone())
                        .await?;
                }
            }
        }
        other => {
            warn!("Unknown callback data '{}' from user {}", other, user_id);
            bot.answer_callback_query(callback_id).await?;
        }
    }

    Ok(())
}

/// Stops the button spinner for presses dropped by the throttle.
pub async fn throttled_callback_handler(bot: Bot, q: CallbackQuery) -> Result<(), teloxide::RequestError> {
    bot.answer_callback_query(q.id).await?;
    Ok(())
}
