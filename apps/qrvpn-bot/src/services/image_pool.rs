//! Pool of pre-generated QR images, one file per VPN client.
//!
//! Files are named `<digits>.<ext>` (for example `42.png`); the digits are the
//! client number that ends up in `Client_№<pk>`. Handles are yielded in
//! ascending client-number order, ties broken by file name, so operators can
//! stage images predictably. Files whose stem is not a number are skipped.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CLIENT_ID_PREFIX: &str = "Client_№";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub path: PathBuf,
    /// The digits of the file stem, verbatim. `007.png` stays `"007"`.
    pk: String,
}

impl ImageHandle {
    /// Builds a handle from the file stem. Directory depth is irrelevant.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let pk = stem.to_string();
        Some(Self { path, pk })
    }

    pub fn pk(&self) -> String {
        self.pk.clone()
    }

    pub fn client_id(&self) -> String {
        format!("{}{}", CLIENT_ID_PREFIX, self.pk)
    }

    /// Orders by numeric value without parsing, so stems of any length work.
    fn numeric_key(&self) -> (usize, &str) {
        let significant = self.pk.trim_start_matches('0');
        (significant.len(), significant)
    }
}

#[async_trait]
pub trait ImagePool: Send + Sync {
    /// Claims the next unused image. `None` once the pool is exhausted.
    async fn next(&self) -> Result<Option<ImageHandle>>;
    /// Deletes a delivered image and drops its claim.
    async fn consume(&self, handle: ImageHandle) -> Result<()>;
    /// Returns a claimed image to the pool without deleting it.
    async fn release(&self, handle: &ImageHandle);
    /// Unclaimed images still on disk.
    async fn remaining(&self) -> Result<usize>;
}

/// Image pool backed by a directory on disk.
///
/// Claims live in process memory: two tasks of this bot never receive the same
/// file, but a second bot process pointed at the same directory could.
pub struct DirImagePool {
    dir: PathBuf,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DirImagePool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn scan(&self, claimed: &HashSet<PathBuf>) -> Result<Vec<ImageHandle>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read image pool {}", self.dir.display()))?;

        let mut handles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to list image pool entry")?
        {
            let path = entry.path();
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if claimed.contains(&path) {
                continue;
            }
            match ImageHandle::from_path(path) {
                Some(handle) => handles.push(handle),
                None => warn!(
                    "Skipping pool file without a numeric name: {}",
                    entry.path().display()
                ),
            }
        }

        handles.sort_by(|a, b| {
            a.numeric_key()
                .cmp(&b.numeric_key())
                .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
        });
        Ok(handles)
    }
}

#[async_trait]
impl ImagePool for DirImagePool {
    async fn next(&self) -> Result<Option<ImageHandle>> {
        // Held across the scan so concurrent callers serialize their claims.
        let mut claimed = self.claimed.lock().await;
        let next = self.scan(&claimed).await?.into_iter().next();
        match &next {
            Some(handle) => {
                claimed.insert(handle.path.clone());
                debug!("Claimed pool image {}", handle.path.display());
            }
            None => warn!("Image pool {} is exhausted", self.dir.display()),
        }
        Ok(next)
    }

    async fn consume(&self, handle: ImageHandle) -> Result<()> {
        match tokio::fs::remove_file(&handle.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Pool image {} was already gone", handle.path.display());
            }
            Err(e) => {
                // Keep the claim so this process never hands the file out again.
                return Err(e).with_context(|| {
                    format!("Failed to delete pool image {}", handle.path.display())
                });
            }
        }
        self.claimed.lock().await.remove(&handle.path);
        info!("Consumed pool image {}", handle.path.display());
        Ok(())
    }

    async fn release(&self, handle: &ImageHandle) {
        self.claimed.lock().await.remove(&handle.path);
        debug!("Released pool image {}", handle.path.display());
    }

    async fn remaining(&self) -> Result<usize> {
        let claimed = self.claimed.lock().await;
        Ok(self.scan(&claimed).await?.len())
    }
}
