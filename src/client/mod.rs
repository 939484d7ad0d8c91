//! Backend clients for the thermostat API.
//!
//! - Blocking clients using `ureq` (no async).
//! - [`local::LocalClient`] speaks the on-premises controller's form-encoded API.
//! - [`cloud::CloudClient`] speaks the cloud gateway's JSON API.
//!
//! The dashboard is written once against [`Backend`]; optional features (status feed,
//! one-time schedules) are advertised through [`Capabilities`].

pub mod cloud;
pub mod local;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::office::{NewSchedule, ScheduleId, ScheduleMap, Speed, StatusMap, ThermostatId};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("json error decoding {what} at `{path}`: {message}")]
    Decode {
        what: &'static str,
        path: String,
        message: String,
    },
    #[error("{0} not supported by this backend")]
    Unsupported(&'static str),
    #[error("invalid schedule id `{0}`")]
    InvalidScheduleId(ScheduleId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Backend exposes a per-thermostat status feed.
    pub status: bool,
    /// Backend accepts schedules that fire once and are then removed.
    pub one_time: bool,
}

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn base_url(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Full schedule set; every registered thermostat is present, possibly empty.
    fn get_schedules(&self) -> Result<ScheduleMap, ClientError>;

    fn get_status(&self) -> Result<StatusMap, ClientError> {
        Err(ClientError::Unsupported("status feed"))
    }

    fn set_speed(&self, thermostat: ThermostatId, speed: Speed) -> Result<(), ClientError>;

    fn add_schedule(&self, thermostat: ThermostatId, schedule: &NewSchedule) -> Result<(), ClientError>;

    fn delete_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId) -> Result<(), ClientError>;

    fn toggle_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId, active: bool) -> Result<(), ClientError>;
}

impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn base_url(&self) -> &str {
        (**self).base_url()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn get_schedules(&self) -> Result<ScheduleMap, ClientError> {
        (**self).get_schedules()
    }

    fn get_status(&self) -> Result<StatusMap, ClientError> {
        (**self).get_status()
    }

    fn set_speed(&self, thermostat: ThermostatId, speed: Speed) -> Result<(), ClientError> {
        (**self).set_speed(thermostat, speed)
    }

    fn add_schedule(&self, thermostat: ThermostatId, schedule: &NewSchedule) -> Result<(), ClientError> {
        (**self).add_schedule(thermostat, schedule)
    }

    fn delete_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId) -> Result<(), ClientError> {
        (**self).delete_schedule(thermostat, schedule)
    }

    fn toggle_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId, active: bool) -> Result<(), ClientError> {
        (**self).toggle_schedule(thermostat, schedule, active)
    }
}

/// Agent plus base URL, shared by both clients.
pub(crate) struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpTransport {
    pub(crate) fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        // Status codes are inspected by hand so error bodies can be surfaced.
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();
        HttpTransport {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Read the body of a response, turning non-2xx statuses into [`ClientError::Http`].
pub(crate) fn read_body(resp: Result<http::Response<ureq::Body>, ureq::Error>) -> Result<String, ClientError> {
    let mut resp = resp?;
    let status = resp.status();
    let body = resp.body_mut().read_to_string()?;
    if !status.is_success() {
        let message = error_field(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                String::from("<no body>")
            } else {
                body.trim().to_string()
            }
        });
        return Err(ClientError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(what: &'static str, body: &str) -> Result<T, ClientError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| ClientError::Decode {
        what,
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Decode list entries one by one, pairing each with its position in the list. Malformed
/// entries are logged and skipped.
pub(crate) fn decode_entries<T: DeserializeOwned>(what: &'static str, entries: Vec<serde_json::Value>) -> Vec<(usize, T)> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, raw)| match serde_path_to_error::deserialize::<_, T>(raw) {
            Ok(entry) => Some((idx, entry)),
            Err(e) => {
                warn!("Skipping malformed {} #{} at `{}`: {}", what, idx, e.path(), e.inner());
                None
            }
        })
        .collect()
}

/// Application-level acknowledgement carried in a 2xx body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Ack {
    /// Local controller: `success` must be present and true.
    pub(crate) fn require_success(self) -> Result<(), ClientError> {
        match (self.success, self.error) {
            (Some(true), _) => Ok(()),
            (_, Some(err)) => Err(ClientError::Rejected(err)),
            (Some(false), None) => Err(ClientError::Rejected(String::from("success=false"))),
            (None, None) => Err(ClientError::Rejected(String::from("missing success flag"))),
        }
    }

    /// Cloud gateway: any 2xx is fine unless the body names an error.
    pub(crate) fn reject_error(self) -> Result<(), ClientError> {
        match (self.success, self.error) {
            (_, Some(err)) => Err(ClientError::Rejected(err)),
            (Some(false), None) => Err(ClientError::Rejected(String::from("success=false"))),
            _ => Ok(()),
        }
    }
}

/// Parse an acknowledgement; an empty body counts as an empty object.
pub(crate) fn decode_ack(body: &str) -> Result<Ack, ClientError> {
    if body.trim().is_empty() {
        return Ok(Ack::default());
    }
    decode("acknowledgement", body)
}

fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<Ack>(body).ok().and_then(|a| a.error)
}
