use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{error, info, warn};

use crate::bot::keyboards::{main_menu, plans_keyboard, settings_keyboard};
use crate::bot::Command;
use crate::lexicon;
use crate::services::fulfillment::Recipient;
use crate::services::notification_service::PoolShortfall;
use crate::services::subscription_service::TrialEligibility;
use crate::state::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let Some(command) = msg.text().and_then(Command::from_text) else {
        info!("Ignoring free text from user {}", user_id);
        return Ok(());
    };
    info!("User {} -> {:?}", user_id, command);

    match command {
        Command::Start => {
            match state
                .stores
                .users
                .register(user_id, &user.full_name(), user.username.as_deref())
                .await
            {
                Ok(true) => info!("Registered new user {}", user_id),
                Ok(false) => {}
                Err(e) => error!("Failed to register user {}: {:#}", user_id, e),
            }
            bot.send_message(msg.chat.id, lexicon::MENU)
                .reply_markup(main_menu())
                .await?;
        }
        Command::Pay => {
            bot.send_message(msg.chat.id, lexicon::CHOOSE_PLAN)
                .reply_markup(plans_keyboard())
                .await?;
        }
        Command::Trial => trial(&bot, &msg, &state, user_id).await?,
        Command::Profile => {
            let text = match state.stores.subscriptions.find_active(user_id, Utc::now()).await {
                Ok(Some(sub)) => {
                    let client = sub.client_id.as_deref().filter(|_| sub.has_assigned_client());
                    lexicon::profile(&lexicon::display_date(sub.end_date, state.config.utc_offset), client)
                }
                Ok(None) => lexicon::NO_SUBSCRIPTION.to_string(),
                Err(e) => {
                    error!("Failed to load profile of user {}: {:#}", user_id, e);
                    lexicon::FULFILLMENT_FAILED.to_string()
                }
            };
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Settings => {
            bot.send_message(msg.chat.id, lexicon::SETTINGS)
                .parse_mode(ParseMode::Html)
                .reply_markup(settings_keyboard())
                .await?;
        }
        Command::Support => {
            bot.send_message(msg.chat.id, lexicon::SUPPORT)
                .reply_markup(state.keyboards.support.clone())
                .await?;
        }
    }

    Ok(())
}

async fn trial(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: i64,
) -> Result<(), teloxide::RequestError> {
    let now = Utc::now();

    let eligibility = match state.subscriptions.trial_eligibility(user_id, now).await {
        Ok(eligibility) => eligibility,
        Err(e) => {
            error!("Trial eligibility check failed for user {}: {:#}", user_id, e);
            bot.send_message(msg.chat.id, lexicon::FULFILLMENT_FAILED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
            return Ok(());
        }
    };
    match eligibility {
        TrialEligibility::Eligible => {}
        TrialEligibility::AlreadyUsed => {
            bot.send_message(msg.chat.id, lexicon::TRIAL_ALREADY_USED)
                .reply_markup(plans_keyboard())
                .await?;
            return Ok(());
        }
        TrialEligibility::HasActiveSubscription => {
            bot.send_message(msg.chat.id, lexicon::TRIAL_HAS_SUBSCRIPTION).await?;
            return Ok(());
        }
    }

    let image = match state.pool.next().await {
        Ok(Some(image)) => image,
        Ok(None) => {
            warn!("No image left for the trial of user {}", user_id);
            bot.send_message(msg.chat.id, lexicon::POOL_EXHAUSTED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
            state.notifications.alert_pool_exhausted(user_id, PoolShortfall::Trial).await;
            return Ok(());
        }
        Err(e) => {
            error!("Image pool failed during trial of user {}: {:#}", user_id, e);
            bot.send_message(msg.chat.id, lexicon::FULFILLMENT_FAILED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
            return Ok(());
        }
    };

    let client_id = image.client_id();
    if let Err(e) = state
        .fulfillment
        .process_trial(
            state.outbox.as_ref(),
            Recipient::private(user_id),
            &state.keyboards,
            &client_id,
            image,
            now,
        )
        .await
    {
        error!("Trial fulfillment failed for user {}: {}", user_id, e);
        if !e.user_notified() {
            bot.send_message(msg.chat.id, lexicon::FULFILLMENT_FAILED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
        }
    }
    Ok(())
}
