use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use teloxide::types::ChatId;
use url::Url;

const DEFAULT_SUPPORT_URL: &str = "https://t.me/qrvpn_support";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    pub payment_provider_token: String,
    pub admin_ids: Vec<i64>,
    pub admin_group: Option<ChatId>,
    pub qr_pool_dir: PathBuf,
    pub support_url: Url,
    pub log_dir: PathBuf,
    pub reminder_days: i64,
    pub throttle_period: Duration,
    /// Time zone used when dates are shown to users.
    pub utc_offset: FixedOffset,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).with_context(|| format!("{key} is not set"));

        let admin_ids = match var("ADMIN_IDS") {
            Some(raw) => parse_id_list(&raw).context("ADMIN_IDS must be a comma-separated list of user ids")?,
            None => Vec::new(),
        };

        let admin_group = var("ADMIN_GROUP_ID")
            .map(|raw| raw.parse::<i64>().map(ChatId))
            .transpose()
            .context("ADMIN_GROUP_ID must be a chat id")?;

        let support_url = var("SUPPORT_URL").unwrap_or_else(|| DEFAULT_SUPPORT_URL.to_string());
        let support_url = Url::parse(&support_url)
            .with_context(|| format!("SUPPORT_URL is not a valid URL: {support_url}"))?;

        let reminder_days = match var("REMINDER_DAYS") {
            Some(raw) => raw.parse::<i64>().context("REMINDER_DAYS must be a number")?,
            None => 3,
        };
        if reminder_days < 1 {
            bail!("REMINDER_DAYS must be at least 1, got {reminder_days}");
        }

        let throttle_ms = match var("THROTTLE_MS") {
            Some(raw) => raw.parse::<u64>().context("THROTTLE_MS must be a number of milliseconds")?,
            None => 500,
        };
        if throttle_ms == 0 {
            bail!("THROTTLE_MS must be greater than zero");
        }

        let offset_hours = match var("UTC_OFFSET_HOURS") {
            Some(raw) => raw.parse::<i32>().context("UTC_OFFSET_HOURS must be a whole number of hours")?,
            None => 3,
        };
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .with_context(|| format!("UTC_OFFSET_HOURS is out of range: {offset_hours}"))?;

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            payment_provider_token: required("PAYMENT_PROVIDER_TOKEN")?,
            admin_ids,
            admin_group,
            qr_pool_dir: var("QR_POOL_DIR").unwrap_or_else(|| "qr_pool".into()).into(),
            support_url,
            log_dir: var("LOG_DIR").unwrap_or_else(|| "logs".into()).into(),
            reminder_days,
            throttle_period: Duration::from_millis(throttle_ms),
            utc_offset,
        })
    }
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("invalid id '{s}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:abc"),
        ("DATABASE_URL", "postgres://bot@localhost/qrvpn"),
        ("PAYMENT_PROVIDER_TOKEN", "381764678:TEST"),
    ];

    #[test]
    fn defaults_fill_optional_keys() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert!(config.admin_ids.is_empty());
        assert_eq!(config.admin_group, None);
        assert_eq!(config.qr_pool_dir, PathBuf::from("qr_pool"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.support_url.as_str(), "https://t.me/qrvpn_support");
        assert_eq!(config.reminder_days, 3);
        assert_eq!(config.throttle_period, Duration::from_millis(500));
        assert_eq!(config.utc_offset.local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn parses_admin_lists_and_group() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ADMIN_IDS", " 11, 22 ,,33"));
        pairs.push(("ADMIN_GROUP_ID", "-1001234"));
        pairs.push(("REMINDER_DAYS", "5"));
        pairs.push(("THROTTLE_MS", "1500"));
        pairs.push(("UTC_OFFSET_HOURS", "-5"));

        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.admin_ids, vec![11, 22, 33]);
        assert_eq!(config.admin_group, Some(ChatId(-1001234)));
        assert_eq!(config.reminder_days, 5);
        assert_eq!(config.throttle_period, Duration::from_millis(1500));
        assert_eq!(config.utc_offset.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn missing_required_key_is_named() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("PAYMENT_PROVIDER_TOKEN"));
    }

    #[test]
    fn rejects_malformed_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ADMIN_IDS", "11,bob"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SUPPORT_URL", "not a url"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("REMINDER_DAYS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("THROTTLE_MS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("UTC_OFFSET_HOURS", "25"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
