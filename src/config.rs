use std::{net::SocketAddr, str::FromStr, time::Duration};

use url::Url;

use crate::{
    error::SettingsError,
    play::{adapter::Timing, player::PlayConfig, share::ShareLinkBuilder},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub teloxide_token: String,
    pub log_level: String,
    /// Long polling is used when this is `None`.
    pub webhook: Option<Webhook>,
    pub share_base_url: Option<Url>,
    pub timing: Timing,
    pub session_idle: Duration,
}

impl Settings {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let required = |name: &'static str| lookup(name).ok_or(SettingsError::Missing(name));

        let ngrok_url = parsed::<Url>(&lookup, "NGROK_URL")?;
        let ngrok_addr = parsed::<SocketAddr>(&lookup, "NGROK_ADDR")?;
        let webhook = match (ngrok_url, ngrok_addr) {
            (Some(url), Some(addr)) => Some(Webhook { url, addr }),
            _ => None,
        };

        let defaults = Timing::default();
        let timing = Timing {
            typing: parsed::<u64>(&lookup, "TYPING_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.typing),
            feedback: parsed::<u64>(&lookup, "FEEDBACK_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.feedback),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            teloxide_token: required("TELOXIDE_TOKEN")?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            webhook,
            share_base_url: parsed::<Url>(&lookup, "SHARE_BASE_URL")?,
            timing,
            session_idle: parsed::<u64>(&lookup, "SESSION_IDLE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(PlayConfig::default().idle),
        })
    }

    pub fn play_config(&self) -> PlayConfig {
        PlayConfig {
            timing: self.timing,
            share: self.share_base_url.clone().map(ShareLinkBuilder::new),
            idle: self.session_idle,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| SettingsError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/quizplay"),
        ("TELOXIDE_TOKEN", "123:abc"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let settings = settings(&BASE).unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.webhook, None);
        assert_eq!(settings.timing, Timing::default());
        assert!(settings.play_config().share.is_none());
        assert_eq!(settings.play_config().idle, Duration::from_secs(30 * 60));
    }

    #[test]
    fn missing_token_is_reported_by_name() {
        let err = settings(&BASE[..1]).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("TELOXIDE_TOKEN")));
    }

    #[test]
    fn webhook_needs_both_url_and_addr() {
        let mut vars = BASE.to_vec();
        vars.push(("NGROK_URL", "https://bot.example/hook"));
        assert_eq!(settings(&vars).unwrap().webhook, None);

        vars.push(("NGROK_ADDR", "0.0.0.0:8443"));
        let webhook = settings(&vars).unwrap().webhook.unwrap();
        assert_eq!(webhook.addr.port(), 8443);
    }

    #[test]
    fn delays_are_read_in_milliseconds() {
        let mut vars = BASE.to_vec();
        vars.push(("TYPING_DELAY_MS", "250"));
        vars.push(("FEEDBACK_DELAY_MS", "900"));
        let timing = settings(&vars).unwrap().timing;
        assert_eq!(timing.typing, Duration::from_millis(250));
        assert_eq!(timing.feedback, Duration::from_millis(900));
    }

    #[test]
    fn idle_timeout_is_read_in_seconds() {
        let mut vars = BASE.to_vec();
        vars.push(("SESSION_IDLE_SECS", "90"));
        assert_eq!(settings(&vars).unwrap().play_config().idle, Duration::from_secs(90));
    }

    #[test]
    fn unparsable_values_are_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("FEEDBACK_DELAY_MS", "soon"));
        let err = settings(&vars).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "FEEDBACK_DELAY_MS", .. }));
    }
}
