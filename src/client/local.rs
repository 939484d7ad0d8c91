//! Client for the on-premises controller.
//!
//! Plain GET/POST with form-encoded bodies. Schedules are addressed by their position in the
//! thermostat's list, so ids handed out here are only valid until the next mutation.

use log::debug;
use serde::Deserialize;
use std::time::Duration;

use super::{decode, decode_ack, decode_entries, read_body, Backend, Capabilities, ClientError, HttpTransport};
use crate::models::office::{
    empty_schedule_map, find_thermostat, NewSchedule, Schedule, ScheduleId, ScheduleMap, Speed, ThermostatId, Weekdays,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8086";

#[derive(Debug, Deserialize)]
struct AllSchedulesResponse {
    thermostats: Vec<ThermostatSchedules>,
}

#[derive(Debug, Deserialize)]
struct ThermostatSchedules {
    #[serde(default)]
    schedules: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct LocalSchedule {
    days: Weekdays,
    hour: u8,
    minute: u8,
    speed: Speed,
    #[serde(default)]
    active: Option<bool>,
}

pub struct LocalClient {
    http: HttpTransport,
}

impl LocalClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        LocalClient {
            http: HttpTransport::new(base_url, timeout),
        }
    }

    fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<(), ClientError> {
        let url = self.http.url(path);
        debug!("POST {} {:?}", url, form);
        let resp = self
            .http
            .agent()
            .post(&url)
            .header("Accept", "application/json")
            .send_form(form.iter().map(|(k, v)| (*k, v.as_str())));
        let body = read_body(resp)?;
        decode_ack(&body)?.require_success()
    }
}

fn schedule_index(id: &ScheduleId) -> Result<usize, ClientError> {
    id.0.parse::<usize>().map_err(|_| ClientError::InvalidScheduleId(id.clone()))
}

fn days_csv(days: &Weekdays) -> String {
    days.indexes().iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
}

fn into_schedule_map(resp: AllSchedulesResponse) -> ScheduleMap {
    let mut map = empty_schedule_map();
    for (index, thermo) in resp.thermostats.into_iter().enumerate() {
        let Ok(raw_id) = u8::try_from(index) else {
            break;
        };
        let id = ThermostatId(raw_id);
        if find_thermostat(id).is_none() {
            debug!("ignoring schedules for unregistered thermostat {}", id);
            continue;
        }
        let schedules = decode_entries::<LocalSchedule>("schedule", thermo.schedules.unwrap_or_default())
            .into_iter()
            .map(|(idx, s)| Schedule {
                id: ScheduleId::from_index(idx),
                days: s.days,
                hour: s.hour,
                minute: s.minute,
                speed: s.speed,
                active: s.active.unwrap_or(true),
                one_time: false,
            })
            .collect();
        map.insert(id, schedules);
    }
    map
}

impl Backend for LocalClient {
    fn name(&self) -> &'static str {
        "local"
    }

    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn get_schedules(&self) -> Result<ScheduleMap, ClientError> {
        let url = self.http.url("/getAllSchedules");
        let resp = self.http.agent().get(&url).header("Accept", "application/json").call();
        let body = read_body(resp)?;
        let all: AllSchedulesResponse = decode("schedule list", &body)?;
        Ok(into_schedule_map(all))
    }

    fn set_speed(&self, thermostat: ThermostatId, speed: Speed) -> Result<(), ClientError> {
        let url = self.http.url("/set");
        debug!("GET {} id={} speed={}", url, thermostat, speed.level());
        let resp = self
            .http
            .agent()
            .get(&url)
            .query("id", &thermostat.to_string())
            .query("speed", &speed.level().to_string())
            .call();
        read_body(resp).map(|_| ())
    }

    fn add_schedule(&self, thermostat: ThermostatId, schedule: &NewSchedule) -> Result<(), ClientError> {
        if schedule.one_time {
            return Err(ClientError::Unsupported("one-time schedules"));
        }
        self.post_form(
            "/addSchedule",
            &[
                ("id", thermostat.to_string()),
                ("days", days_csv(&schedule.days)),
                ("hour", schedule.hour.to_string()),
                ("minute", schedule.minute.to_string()),
                ("speed", schedule.speed.level().to_string()),
            ],
        )
    }

    fn delete_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId) -> Result<(), ClientError> {
        let index = schedule_index(schedule)?;
        self.post_form(
            "/deleteSchedule",
            &[("thermoId", thermostat.to_string()), ("scheduleIndex", index.to_string())],
        )
    }

    fn toggle_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId, active: bool) -> Result<(), ClientError> {
        let index = schedule_index(schedule)?;
        self.post_form(
            "/toggleSchedule",
            &[
                ("thermoId", thermostat.to_string()),
                ("scheduleIndex", index.to_string()),
                ("active", active.to_string()),
            ],
        )
    }
}
