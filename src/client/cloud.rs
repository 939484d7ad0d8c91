//! Client for the cloud API gateway.
//!
//! JSON in both directions. Schedules carry server-assigned ids, maps are keyed by the
//! thermostat id rendered as a string, and the gateway also reports the last known speed of
//! every thermostat.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{decode, decode_ack, decode_entries, read_body, Backend, Capabilities, ClientError, HttpTransport};
use crate::models::office::{
    empty_schedule_map, find_thermostat, NewSchedule, Schedule, ScheduleId, ScheduleMap, Speed, StatusMap,
    ThermostatId, Weekdays,
};

#[derive(Debug, Deserialize)]
struct SchedulesResponse {
    schedules: BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudSchedule {
    id: ScheduleId,
    days: Weekdays,
    hour: u8,
    minute: u8,
    speed: Speed,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    one_time: bool,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: BTreeMap<String, ThermostatStatus>,
}

#[derive(Debug, Deserialize)]
struct ThermostatStatus {
    #[serde(default)]
    speed: Option<Speed>,
}

#[derive(Debug, Serialize)]
struct SetSpeedRequest {
    id: ThermostatId,
    speed: Speed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddScheduleRequest<'a> {
    thermo_id: ThermostatId,
    days: &'a Weekdays,
    hour: u8,
    minute: u8,
    speed: Speed,
    one_time: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleScheduleRequest<'a> {
    thermo_id: ThermostatId,
    schedule_id: &'a ScheduleId,
    active: bool,
}

pub struct CloudClient {
    http: HttpTransport,
}

/// Map a string key from the gateway onto a registered thermostat.
fn registered_id(key: &str) -> Option<ThermostatId> {
    let id = key.trim().parse::<u8>().ok().map(ThermostatId)?;
    find_thermostat(id).map(|t| t.id)
}

fn into_schedule_map(resp: SchedulesResponse) -> ScheduleMap {
    let mut map = empty_schedule_map();
    for (key, schedules) in resp.schedules {
        let Some(id) = registered_id(&key) else {
            warn!("Cloud: skipping schedules for unknown thermostat key {:?}", key);
            continue;
        };
        let schedules = decode_entries::<CloudSchedule>("schedule", schedules)
            .into_iter()
            .map(|(_, s)| Schedule {
                id: s.id,
                days: s.days,
                hour: s.hour,
                minute: s.minute,
                speed: s.speed,
                active: s.active.unwrap_or(true),
                one_time: s.one_time,
            })
            .collect();
        map.insert(id, schedules);
    }
    map
}

fn into_status_map(resp: StatusResponse) -> StatusMap {
    let mut map = StatusMap::new();
    for (key, status) in resp.status {
        let Some(id) = registered_id(&key) else {
            warn!("Cloud: skipping status for unknown thermostat key {:?}", key);
            continue;
        };
        if let Some(speed) = status.speed {
            map.insert(id, speed);
        }
    }
    map
}

impl CloudClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        CloudClient {
            http: HttpTransport::new(base_url, timeout),
        }
    }

    fn get_body(&self, path: &str) -> Result<String, ClientError> {
        let url = self.http.url(path);
        read_body(self.http.agent().get(&url).header("Accept", "application/json").call())
    }

    fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> Result<(), ClientError> {
        let url = self.http.url(path);
        debug!("POST {}", url);
        let resp = self
            .http
            .agent()
            .post(&url)
            .header("Accept", "application/json")
            .send_json(payload);
        let body = read_body(resp)?;
        decode_ack(&body)?.reject_error()
    }
}

impl Backend for CloudClient {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            status: true,
            one_time: true,
        }
    }

    fn get_schedules(&self) -> Result<ScheduleMap, ClientError> {
        let body = self.get_body("/schedules")?;
        let resp: SchedulesResponse = decode("schedule list", &body)?;
        Ok(into_schedule_map(resp))
    }

    fn get_status(&self) -> Result<StatusMap, ClientError> {
        let body = self.get_body("/status")?;
        let resp: StatusResponse = decode("status", &body)?;
        Ok(into_status_map(resp))
    }

    fn set_speed(&self, thermostat: ThermostatId, speed: Speed) -> Result<(), ClientError> {
        self.post_json("/thermostat", &SetSpeedRequest { id: thermostat, speed })
    }

    fn add_schedule(&self, thermostat: ThermostatId, schedule: &NewSchedule) -> Result<(), ClientError> {
        self.post_json(
            "/schedules",
            &AddScheduleRequest {
                thermo_id: thermostat,
                days: &schedule.days,
                hour: schedule.hour,
                minute: schedule.minute,
                speed: schedule.speed,
                one_time: schedule.one_time,
            },
        )
    }

    fn delete_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId) -> Result<(), ClientError> {
        let url = self.http.url("/schedules");
        debug!("DELETE {} thermoId={} scheduleId={}", url, thermostat, schedule);
        let resp = self
            .http
            .agent()
            .delete(&url)
            .header("Accept", "application/json")
            .query("thermoId", &thermostat.to_string())
            .query("scheduleId", &schedule.0)
            .call();
        let body = read_body(resp)?;
        decode_ack(&body)?.reject_error()
    }

    fn toggle_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId, active: bool) -> Result<(), ClientError> {
        self.post_json(
            "/schedules/toggle",
            &ToggleScheduleRequest {
                thermo_id: thermostat,
                schedule_id: schedule,
                active,
            },
        )
    }
}
