use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::PreCheckoutQuery;
use tracing::{error, info, warn};

use crate::lexicon;
use crate::models::plan::Plan;
use crate::services::fulfillment::{FulfillmentError, Recipient};
use crate::services::notification_service::PoolShortfall;
use crate::services::subscription_service::PaymentKind;
use crate::state::AppState;

const CURRENCY: &str = "RUB";

/// Accepts a checkout only for a known plan billed at its list price.
pub fn validate_checkout(payload: &str, currency: &str, total_amount: u32) -> Result<Plan, &'static str> {
    let plan = Plan::from_payload(payload).ok_or("Неизвестный тариф")?;
    if currency != CURRENCY || total_amount != plan.price_minor() {
        return Err("Сумма оплаты не совпадает с тарифом");
    }
    Ok(plan)
}

pub async fn pre_checkout_handler(
    bot: Bot,
    q: PreCheckoutQuery,
) -> Result<(), teloxide::RequestError> {
    let user_id = q.from.id.0 as i64;
    match validate_checkout(&q.invoice_payload, &q.currency, q.total_amount) {
        Ok(plan) => {
            info!("Pre-checkout accepted for user {} ({})", user_id, plan.code());
            bot.answer_pre_checkout_query(q.id, true).await?;
        }
        Err(reason) => {
            warn!(
                "Pre-checkout rejected for user {}: payload '{}', {} {}",
                user_id, q.invoice_payload, q.total_amount, q.currency
            );
            let mut answer = bot.answer_pre_checkout_query(q.id, false);
            answer.error_message = Some(reason.to_string());
            answer.await?;
        }
    }
    Ok(())
}

pub async fn successful_payment_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let Some(user_id) = msg.from.as_ref().map(|u| u.id.0 as i64) else {
        return Ok(());
    };
    info!(
        "Successful payment from user {}: {} {} (payload '{}', charge {})",
        user_id,
        payment.total_amount,
        payment.currency,
        payment.invoice_payload,
        payment.provider_payment_charge_id
    );

    let Some(plan) = Plan::from_payload(&payment.invoice_payload) else {
        error!("Paid invoice with unknown payload '{}'", payment.invoice_payload);
        bot.send_message(msg.chat.id, lexicon::UNKNOWN_PLAN)
            .reply_markup(state.keyboards.support.clone())
            .await?;
        return Ok(());
    };

    let now = Utc::now();
    let applied = match state.subscriptions.apply_payment(user_id, plan, now).await {
        Ok(applied) => applied,
        Err(e) => {
            error!("Failed to record payment of user {}: {:#}", user_id, e);
            bot.send_message(msg.chat.id, lexicon::FULFILLMENT_FAILED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
            return Ok(());
        }
    };

    let end_date = lexicon::display_date(applied.end_date, state.config.utc_offset);
    let to = Recipient {
        user_id,
        chat_id: msg.chat.id,
    };
    let outbox = state.outbox.as_ref();
    let result = match applied.kind {
        PaymentKind::Renewal => {
            state
                .fulfillment
                .process_re_subscription(outbox, to, &end_date, &state.keyboards, now)
                .await
        }
        PaymentKind::First => {
            state
                .fulfillment
                .process_first_subscription(outbox, to, &end_date, &state.keyboards, now)
                .await
        }
    };

    match result {
        Ok(outcome) => info!("Payment of user {} fulfilled: {:?}", user_id, outcome),
        Err(FulfillmentError::PoolExhausted) => {
            error!("Image pool exhausted while fulfilling payment of user {}", user_id);
            bot.send_message(msg.chat.id, lexicon::POOL_EXHAUSTED)
                .reply_markup(state.keyboards.support.clone())
                .await?;
            state.notifications.alert_pool_exhausted(user_id, PoolShortfall::Payment).await;
        }
        Err(e) => {
            error!("Fulfillment failed for user {}: {}", user_id, e);
            if !e.user_notified() {
                bot.send_message(msg.chat.id, lexicon::FULFILLMENT_FAILED)
                    .reply_markup(state.keyboards.support.clone())
                    .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_accepts_list_price() {
        assert_eq!(validate_checkout("plan:6m", "RUB", 90_000), Ok(Plan::SixMonths));
    }

    #[test]
    fn checkout_rejects_tampered_invoices() {
        assert!(validate_checkout("plan:6m", "RUB", 100).is_err());
        assert!(validate_checkout("plan:6m", "USD", 90_000).is_err());
        assert!(validate_checkout("plan:forever", "RUB", 90_000).is_err());
    }
}
