use teloxide::utils::command::BotCommands;
use teloxide::{dptree, prelude::*, types::Update};
use tracing::{error, info, warn};

use crate::lexicon;
use crate::state::AppState;

pub mod handlers;
pub mod keyboards;
pub mod outbound;
pub mod throttle;

/// Commands shown in the Telegram menu. Each one mirrors a reply-keyboard button.
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "оплатить подписку")]
    Pay,
    #[command(description = "пробный период")]
    Trial,
    #[command(description = "профиль и срок подписки")]
    Profile,
    #[command(description = "настройки подключения")]
    Settings,
    #[command(description = "поддержка")]
    Support,
}

impl Command {
    /// Resolves a reply-keyboard button or a slash command (`/pay`,
    /// `/pay@bot_name`) to a command.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        let by_button = match text {
            keyboards::BTN_PAY => Some(Command::Pay),
            keyboards::BTN_TRIAL => Some(Command::Trial),
            keyboards::BTN_PROFILE => Some(Command::Profile),
            keyboards::BTN_SETTINGS => Some(Command::Settings),
            keyboards::BTN_SUPPORT => Some(Command::Support),
            _ => None,
        };
        if by_button.is_some() {
            return by_button;
        }

        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next()?.to_lowercase();
        match name.as_str() {
            "start" => Some(Command::Start),
            "pay" => Some(Command::Pay),
            "trial" => Some(Command::Trial),
            "profile" => Some(Command::Profile),
            "settings" => Some(Command::Settings),
            "support" => Some(Command::Support),
            _ => None,
        }
    }
}

pub async fn run_bot(
    bot: Bot,
    mut shutdown_signal: tokio::sync::broadcast::Receiver<()>,
    state: AppState,
) {
    info!("Starting bot dispatcher...");

    std::panic::set_hook(Box::new(|info| {
        error!("CRITICAL BOT PANIC: {:?}", info);
    }));

    match bot.get_me().await {
        Ok(me) => {
            let username = me.username.clone().unwrap_or_else(|| "unknown".into());
            info!("Bot connected as: @{}", username);
        }
        Err(e) => {
            error!("CRITICAL: Bot failed to connect to Telegram: {}", e);
            return;
        }
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let notified = state.notifications.broadcast_admins(lexicon::BOT_STARTED).await;
    info!("Startup notice sent to {} admin(s)", notified);

    let message_handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(
            dptree::filter(|msg: Message| msg.successful_payment().is_some())
                .endpoint(handlers::payment::successful_payment_handler),
        )
        .branch(
            dptree::filter(|msg: Message, state: AppState| {
                msg.from.as_ref().is_none_or(|user| state.throttle.allow(user.id.0 as i64))
            })
            .endpoint(handlers::command::message_handler),
        );
    let callback_handler = Update::filter_callback_query()
        .branch(
            dptree::filter(|q: CallbackQuery, state: AppState| state.throttle.allow(q.from.id.0 as i64))
                .endpoint(handlers::callback::callback_handler),
        )
        .endpoint(handlers::callback::throttled_callback_handler);
    let pre_checkout_handler =
        Update::filter_pre_checkout_query().endpoint(handlers::payment::pre_checkout_handler);

    let mut dispatcher = Dispatcher::builder(
        bot,
        dptree::entry()
            .branch(message_handler)
            .branch(callback_handler)
            .branch(pre_checkout_handler),
    )
    .dependencies(dptree::deps![state])
    .default_handler(|upd: std::sync::Arc<Update>| async move {
        info!("Unhandled update: {:?}", upd.id);
    })
    .build();

    tokio::select! {
        _ = dispatcher.dispatch() => {
            info!("Bot dispatcher exited naturally");
        }
        _ = shutdown_signal.recv() => {
            info!("Bot received shutdown signal, stopping...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_buttons_map_to_commands() {
        assert_eq!(Command::from_text(keyboards::BTN_PAY), Some(Command::Pay));
        assert_eq!(Command::from_text(keyboards::BTN_TRIAL), Some(Command::Trial));
        assert_eq!(Command::from_text(keyboards::BTN_SUPPORT), Some(Command::Support));
    }

    #[test]
    fn slash_commands_accept_bot_suffix_and_arguments() {
        assert_eq!(Command::from_text("/start"), Some(Command::Start));
        assert_eq!(Command::from_text("/start ref_42"), Some(Command::Start));
        assert_eq!(Command::from_text("/Profile@qrvpn_bot"), Some(Command::Profile));
    }

    #[test]
    fn free_text_is_not_a_command() {
        assert_eq!(Command::from_text("hello"), None);
        assert_eq!(Command::from_text("/unknown"), None);
        assert_eq!(Command::from_text(""), None);
    }
}
