//! Test doubles shared by the service tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::FixedOffset;
use teloxide::types::{ChatId, InlineKeyboardMarkup};
use url::Url;

use crate::bot::keyboards::ReplyKeyboards;
use crate::bot::outbound::{Outbox, Photo};
use crate::services::image_pool::{ImageHandle, ImagePool};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat_id: ChatId, text: String },
    Photo { chat_id: ChatId, photo: Photo, caption: String },
}

/// Records every message instead of talking to Telegram.
#[derive(Clone, Default)]
pub struct RecordingOutbox {
    sent: Arc<Mutex<Vec<Sent>>>,
    uploads: Arc<AtomicUsize>,
    fail_photos: Arc<AtomicBool>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_photos() -> Self {
        let outbox = Self::default();
        outbox.fail_photos.store(true, Ordering::SeqCst);
        outbox
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                Sent::Photo { .. } => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<(Photo, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo { photo, caption, .. } => Some((photo, caption)),
                Sent::Text { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        _keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: Photo,
        caption: &str,
        _keyboard: &InlineKeyboardMarkup,
    ) -> Result<String> {
        if self.fail_photos.load(Ordering::SeqCst) {
            return Err(anyhow!("telegram is down"));
        }
        // Let other tasks run, like a real network round trip would.
        tokio::task::yield_now().await;
        let file_id = match &photo {
            Photo::Cached(id) => id.clone(),
            Photo::File(_) => format!("tg-file-{}", self.uploads.fetch_add(1, Ordering::SeqCst) + 1),
        };
        self.sent.lock().unwrap().push(Sent::Photo {
            chat_id,
            photo,
            caption: caption.to_string(),
        });
        Ok(file_id)
    }
}

/// Pool that hands out one fixed handle whether or not its file exists.
#[derive(Default)]
pub struct FixedPool {
    handle: Mutex<Option<ImageHandle>>,
    pub consumed: Mutex<Vec<PathBuf>>,
    pub released: Mutex<Vec<PathBuf>>,
}

impl FixedPool {
    pub fn with(handle: ImageHandle) -> Self {
        Self {
            handle: Mutex::new(Some(handle)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ImagePool for FixedPool {
    async fn next(&self) -> Result<Option<ImageHandle>> {
        Ok(self.handle.lock().unwrap().take())
    }

    async fn consume(&self, handle: ImageHandle) -> Result<()> {
        self.consumed.lock().unwrap().push(handle.path);
        Ok(())
    }

    async fn release(&self, handle: &ImageHandle) {
        self.released.lock().unwrap().push(handle.path.clone());
    }

    async fn remaining(&self) -> Result<usize> {
        Ok(usize::from(self.handle.lock().unwrap().is_some()))
    }
}

pub fn moscow() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

pub fn keyboards() -> ReplyKeyboards {
    ReplyKeyboards::new(&Url::parse("https://t.me/qrvpn_support").unwrap())
}

pub fn stage_images(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"\x89PNG").unwrap();
    }
}
