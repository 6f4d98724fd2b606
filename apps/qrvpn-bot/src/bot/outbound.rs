//! Outbound messages (fulfillment → Telegram)

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InlineKeyboardMarkup, InputFile, ParseMode};

#[derive(Debug, Clone, PartialEq)]
pub enum Photo {
    /// Upload a file from disk.
    File(PathBuf),
    /// Resend a photo Telegram already hosts.
    Cached(String),
}

/// Sends confirmation messages. Keyboards are forwarded as-is.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Returns the Telegram file id of the largest photo size sent.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: Photo,
        caption: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<String>;
}

#[derive(Clone)]
pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut req = self
            .bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(keyboard.clone());
        }
        req.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: Photo,
        caption: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<String> {
        let input = match photo {
            Photo::File(path) => InputFile::file(path),
            Photo::Cached(file_id) => InputFile::file_id(FileId(file_id)),
        };
        let sent = self
            .bot
            .send_photo(chat_id, input)
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await?;

        sent.photo()
            .and_then(|sizes| sizes.last())
            .map(|size| size.file.id.to_string())
            .ok_or_else(|| anyhow!("Telegram returned a photo message without sizes"))
    }
}
