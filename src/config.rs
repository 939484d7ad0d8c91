//! Minimal runtime configuration helpers.
//! Every setting comes from the environment (optionally via `.env`); CLI flags win.

use std::time::Duration;

use crate::client::cloud::CloudClient;
use crate::client::local::{self, LocalClient};
use crate::client::Backend;
use crate::services::dashboard::{DashboardSettings, DEFAULT_NOTIFICATION_TTL, DEFAULT_STATUS_POLL, DEFAULT_STATUS_SETTLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// On-premises controller, form-encoded API.
    Local,
    /// Cloud API gateway, JSON API.
    Cloud,
}

impl BackendKind {
    fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "cloud" => Ok(BackendKind::Cloud),
            other => Err(format!("THERMO_BACKEND must be `local` or `cloud`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub api_base: String,
    /// Status feed polling cadence (cloud only).
    pub status_poll_interval: Duration,
    /// Wait before re-reading status after a speed change.
    pub status_settle_delay: Duration,
    pub notification_ttl: Duration,
    /// Global per-request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env(backend: Option<BackendKind>, api_base: Option<String>) -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok(), backend, api_base)
    }

    pub fn from_lookup<F>(get: F, backend: Option<BackendKind>, api_base: Option<String>) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let backend = match backend {
            Some(b) => b,
            None => match non_empty("THERMO_BACKEND") {
                Some(v) => BackendKind::parse(&v)?,
                None => BackendKind::Local,
            },
        };

        let api_base = match api_base.or_else(|| non_empty("THERMO_API_BASE")) {
            Some(url) => url.trim().to_string(),
            None => match backend {
                BackendKind::Local => local::DEFAULT_BASE_URL.to_string(),
                BackendKind::Cloud => {
                    return Err("Missing API base: set THERMO_API_BASE or pass --base-url for the cloud backend".to_string());
                }
            },
        };
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(format!("API base must be an http(s) URL, got `{}`", api_base));
        }

        let positive = |key: &str| {
            non_empty(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };

        let status_poll_interval = positive("STATUS_POLL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STATUS_POLL);
        let status_settle_delay = positive("STATUS_SETTLE_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STATUS_SETTLE);
        let notification_ttl = positive("NOTIFICATION_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_NOTIFICATION_TTL);
        let request_timeout = positive("REQUEST_TIMEOUT_SECS").map(Duration::from_secs);

        Ok(Config {
            backend,
            api_base,
            status_poll_interval,
            status_settle_delay,
            notification_ttl,
            request_timeout,
        })
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            notification_ttl: self.notification_ttl,
            status_poll_interval: self.status_poll_interval,
            status_settle_delay: self.status_settle_delay,
        }
    }

    pub fn build_backend(&self) -> Box<dyn Backend> {
        match self.backend {
            BackendKind::Local => Box::new(LocalClient::new(&self.api_base, self.request_timeout)),
            BackendKind::Cloud => Box::new(CloudClient::new(&self.api_base, self.request_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_controller() {
        let cfg = Config::from_lookup(lookup(&[]), None, None).unwrap();
        assert_eq!(cfg.backend, BackendKind::Local);
        assert_eq!(cfg.api_base, local::DEFAULT_BASE_URL);
        assert_eq!(cfg.status_poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.status_settle_delay, Duration::from_secs(1));
        assert_eq!(cfg.notification_ttl, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, None);
    }

    #[test]
    fn cloud_requires_base_url() {
        let err = Config::from_lookup(lookup(&[("THERMO_BACKEND", "cloud")]), None, None).unwrap_err();
        assert!(err.contains("THERMO_API_BASE"));

        let cfg = Config::from_lookup(
            lookup(&[("THERMO_BACKEND", "Cloud"), ("THERMO_API_BASE", "https://api.example.com/prod")]),
            None,
            None,
        )
        .unwrap();
        assert_eq!(cfg.backend, BackendKind::Cloud);
        assert_eq!(cfg.build_backend().name(), "cloud");
    }

    #[test]
    fn cli_overrides_environment() {
        let cfg = Config::from_lookup(
            lookup(&[("THERMO_BACKEND", "cloud"), ("THERMO_API_BASE", "https://gw")]),
            Some(BackendKind::Local),
            Some("http://10.0.0.5:8086".to_string()),
        )
        .unwrap();
        assert_eq!(cfg.backend, BackendKind::Local);
        assert_eq!(cfg.api_base, "http://10.0.0.5:8086");
    }

    #[test]
    fn rejects_unknown_backend_and_bad_url() {
        assert!(Config::from_lookup(lookup(&[("THERMO_BACKEND", "mqtt")]), None, None).is_err());
        assert!(Config::from_lookup(lookup(&[("THERMO_API_BASE", "controller:8086")]), None, None).is_err());
    }

    #[test]
    fn numeric_settings_fall_back_on_garbage() {
        let cfg = Config::from_lookup(
            lookup(&[
                ("STATUS_POLL_SECS", "10"),
                ("STATUS_SETTLE_MS", "abc"),
                ("NOTIFICATION_SECS", "0"),
                ("REQUEST_TIMEOUT_SECS", "15"),
            ]),
            None,
            None,
        )
        .unwrap();
        assert_eq!(cfg.status_poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.status_settle_delay, Duration::from_secs(1));
        assert_eq!(cfg.notification_ttl, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(cfg.dashboard_settings().status_poll_interval, Duration::from_secs(10));
    }
}
