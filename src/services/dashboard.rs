//! View state controller shared by the console and the one-shot commands.
//!
//! Holds the in-memory mirror of what the backend reported, performs one request per user
//! action behind a single busy flag, and replaces the mirror wholesale after every successful
//! mutation. Failures never propagate: they become a transient notification.
//!
//! Time is passed in by the caller (`tick`, `notify`, `notification_at`) so timers stay
//! testable.

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::client::{Backend, Capabilities};
use crate::models::office::{
    empty_schedule_map, find_thermostat, NewSchedule, ScheduleId, ScheduleMap, Speed, StatusMap, ThermostatId,
    Weekdays,
};

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);
pub const DEFAULT_STATUS_POLL: Duration = Duration::from_secs(30);
pub const DEFAULT_STATUS_SETTLE: Duration = Duration::from_secs(1);

const MSG_NO_DAYS: &str = "Seleziona almeno un giorno";
const MSG_NO_TIME: &str = "Inserisci ora e minuti";
const MSG_BAD_TIME: &str = "Orario non valido (ore 0-23, minuti 0-59)";
const MSG_NO_ONE_TIME: &str = "Programmazione singola non supportata da questo backend";
const MSG_NO_SELECTION: &str = "Seleziona un termostato";
pub const MSG_BUSY: &str = "Operazione in corso, attendere";

#[derive(Debug, Clone, Copy)]
pub struct DashboardSettings {
    pub notification_ttl: Duration,
    pub status_poll_interval: Duration,
    /// Delay before re-reading status after a speed change, giving the backend time to apply it.
    pub status_settle_delay: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings {
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            status_poll_interval: DEFAULT_STATUS_POLL,
            status_settle_delay: DEFAULT_STATUS_SETTLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NoticeKind,
    pub shown_at: Instant,
}

/// Result of a user action, after it has been reported through a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Rejected client-side; no request was sent.
    Invalid,
    /// The request failed; displayed state is unchanged.
    Failed,
    /// The operator declined the confirmation.
    Cancelled,
    /// Another action is still in flight.
    Busy,
}

/// Interactive yes/no question.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, question: &str) -> bool {
        self(question)
    }
}

/// Raw input of the add-schedule form. Hour and minute stay strings until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleForm {
    pub days: Vec<usize>,
    pub hour: String,
    pub minute: String,
    pub speed: Speed,
    pub one_time: bool,
}

impl ScheduleForm {
    pub fn toggle_day(&mut self, day: usize) {
        if let Some(pos) = self.days.iter().position(|d| *d == day) {
            self.days.remove(pos);
        } else if day < 7 {
            self.days.push(day);
        }
    }

    pub fn validate(&self, caps: Capabilities) -> Result<NewSchedule, &'static str> {
        if self.days.is_empty() {
            return Err(MSG_NO_DAYS);
        }
        let (hour, minute) = (self.hour.trim(), self.minute.trim());
        if hour.is_empty() || minute.is_empty() {
            return Err(MSG_NO_TIME);
        }
        let hour = hour.parse::<u8>().ok().filter(|h| *h < 24).ok_or(MSG_BAD_TIME)?;
        let minute = minute.parse::<u8>().ok().filter(|m| *m < 60).ok_or(MSG_BAD_TIME)?;
        if self.one_time && !caps.one_time {
            return Err(MSG_NO_ONE_TIME);
        }
        Ok(NewSchedule {
            days: Weekdays::from_indexes(self.days.iter().copied()),
            hour,
            minute,
            speed: self.speed,
            one_time: self.one_time,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub schedules: ScheduleMap,
    pub status: StatusMap,
    pub notification: Option<Notification>,
    /// Thermostat whose schedule panel is open.
    pub selected: Option<ThermostatId>,
    pub show_all: bool,
    pub form: ScheduleForm,
    pub clock: DateTime<Local>,
    pub busy: bool,
}

#[derive(Debug, Default)]
struct Timers {
    next_status_poll: Option<Instant>,
    status_refresh_at: Option<Instant>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Dashboard {
    backend: Box<dyn Backend>,
    settings: DashboardSettings,
    state: Mutex<ViewState>,
    timers: Mutex<Timers>,
    busy: AtomicBool,
}

impl Dashboard {
    pub fn new(backend: Box<dyn Backend>, settings: DashboardSettings) -> Self {
        Dashboard {
            backend,
            settings,
            state: Mutex::new(ViewState {
                schedules: empty_schedule_map(),
                status: StatusMap::new(),
                notification: None,
                selected: None,
                show_all: false,
                form: ScheduleForm::default(),
                clock: Local::now(),
                busy: false,
            }),
            timers: Mutex::new(Timers::default()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    // The mutexes are never held across a request, so a poisoned guard still holds a
    // consistent mirror.
    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    fn refuse_busy(&self) -> Outcome {
        self.notify(MSG_BUSY, NoticeKind::Error, Instant::now());
        Outcome::Busy
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Initial load: schedules, plus status when the backend has a status feed.
    pub fn mount(&self, now: Instant) {
        info!(
            "Mounting dashboard (backend={}, base_url={})",
            self.backend.name(),
            self.backend.base_url()
        );
        self.reload_schedules();
        if self.capabilities().status {
            self.refresh_status();
            self.timers().next_status_poll = Some(now + self.settings.status_poll_interval);
        }
    }

    /// Advance timers: clock display, notification expiry, periodic and post-action status
    /// refreshes. Returns whether anything other than the clock changed.
    pub fn tick(&self, now: Instant, wall: DateTime<Local>) -> bool {
        let mut changed = false;
        {
            let mut state = self.state();
            state.clock = wall;
            if state
                .notification
                .as_ref()
                .is_some_and(|n| now.saturating_duration_since(n.shown_at) >= self.settings.notification_ttl)
            {
                state.notification = None;
                changed = true;
            }
        }

        let refresh = {
            let mut timers = self.timers();
            let poll_due = timers.next_status_poll.is_some_and(|at| now >= at);
            if poll_due {
                timers.next_status_poll = Some(now + self.settings.status_poll_interval);
            }
            let settle_due = timers.status_refresh_at.is_some_and(|at| now >= at);
            if settle_due {
                timers.status_refresh_at = None;
            }
            poll_due || settle_due
        };

        if refresh {
            debug!("Status refresh due");
            changed |= self.refresh_status();
        }
        changed
    }

    /// Replace the schedule mirror with the backend's. On failure every thermostat shows an
    /// empty list.
    pub fn reload_schedules(&self) -> bool {
        match self.backend.get_schedules() {
            Ok(schedules) => {
                let total: usize = schedules.values().map(Vec::len).sum();
                debug!("Loaded {} schedule(s)", total);
                self.state().schedules = schedules;
                true
            }
            Err(e) => {
                warn!("Loading schedules failed, showing none: {}", e);
                self.state().schedules = empty_schedule_map();
                false
            }
        }
    }

    /// Re-read the status feed. A failed read keeps the previous status.
    pub fn refresh_status(&self) -> bool {
        if !self.capabilities().status {
            return false;
        }
        match self.backend.get_status() {
            Ok(status) => {
                self.state().status = status;
                true
            }
            Err(e) => {
                warn!("Status refresh failed: {}", e);
                false
            }
        }
    }

    /// Show `message` from `now` on, replacing whatever was shown before.
    pub fn notify(&self, message: impl Into<String>, kind: NoticeKind, now: Instant) {
        let message = message.into();
        debug!("Notification ({:?}): {}", kind, message);
        self.state().notification = Some(Notification {
            message,
            kind,
            shown_at: now,
        });
    }

    /// The notification still visible at `now`, if any.
    pub fn notification_at(&self, now: Instant) -> Option<Notification> {
        self.state()
            .notification
            .clone()
            .filter(|n| now.saturating_duration_since(n.shown_at) < self.settings.notification_ttl)
    }

    /// Copy of the view state as it should be displayed at `now`.
    pub fn snapshot(&self, now: Instant) -> ViewState {
        let mut view = self.state().clone();
        view.notification = view
            .notification
            .filter(|n| now.saturating_duration_since(n.shown_at) < self.settings.notification_ttl);
        view.busy = self.is_busy();
        view
    }

    pub fn select(&self, thermostat: Option<ThermostatId>) {
        self.state().selected = thermostat;
    }

    pub fn show_all(&self, show: bool) {
        self.state().show_all = show;
    }

    pub fn edit_form<F: FnOnce(&mut ScheduleForm)>(&self, edit: F) {
        edit(&mut self.state().form);
    }

    pub fn set_speed(&self, thermostat: ThermostatId, speed: Speed) -> Outcome {
        let Some(thermo) = find_thermostat(thermostat) else {
            self.notify(format!("Termostato {} sconosciuto", thermostat), NoticeKind::Error, Instant::now());
            return Outcome::Invalid;
        };
        let Some(_busy) = self.begin() else {
            return self.refuse_busy();
        };

        match self.backend.set_speed(thermostat, speed) {
            Ok(()) => {
                let message = format!("{} impostato a {}", thermo.name, speed.label());
                self.notify(message, NoticeKind::Success, Instant::now());
                if self.capabilities().status {
                    self.timers().status_refresh_at = Some(Instant::now() + self.settings.status_settle_delay);
                }
                Outcome::Done
            }
            Err(e) => {
                error!("set_speed({}, {}) failed: {}", thermostat, speed, e);
                let message = format!("Errore: impossibile impostare {}", thermo.name);
                self.notify(message, NoticeKind::Error, Instant::now());
                Outcome::Failed
            }
        }
    }

    /// Add a schedule from form input. On success the schedule list is re-fetched and the
    /// stored form is reset.
    pub fn add_schedule(&self, thermostat: ThermostatId, form: &ScheduleForm) -> Outcome {
        let Some(_busy) = self.begin() else {
            return self.refuse_busy();
        };
        if find_thermostat(thermostat).is_none() {
            self.notify(format!("Termostato {} sconosciuto", thermostat), NoticeKind::Error, Instant::now());
            return Outcome::Invalid;
        }
        let schedule = match form.validate(self.capabilities()) {
            Ok(s) => s,
            Err(msg) => {
                self.notify(msg, NoticeKind::Error, Instant::now());
                return Outcome::Invalid;
            }
        };

        match self.backend.add_schedule(thermostat, &schedule) {
            Ok(()) => {
                self.notify("Programmazione aggiunta", NoticeKind::Success, Instant::now());
                self.reload_schedules();
                self.state().form = ScheduleForm::default();
                Outcome::Done
            }
            Err(e) => {
                error!("add_schedule({}) failed: {}", thermostat, e);
                self.notify("Errore nell'aggiunta della programmazione", NoticeKind::Error, Instant::now());
                Outcome::Failed
            }
        }
    }

    /// Submit the stored form for the thermostat whose panel is open.
    pub fn submit_form(&self) -> Outcome {
        let (selected, form) = {
            let state = self.state();
            (state.selected, state.form.clone())
        };
        match selected {
            Some(id) => self.add_schedule(id, &form),
            None => {
                self.notify(MSG_NO_SELECTION, NoticeKind::Error, Instant::now());
                Outcome::Invalid
            }
        }
    }

    pub fn delete_schedule(&self, thermostat: ThermostatId, schedule: &ScheduleId, confirm: &impl Confirm) -> Outcome {
        let Some(_busy) = self.begin() else {
            return self.refuse_busy();
        };
        if !confirm.confirm("Eliminare questa programmazione?") {
            debug!("Delete of {}/{} declined", thermostat, schedule);
            return Outcome::Cancelled;
        }

        match self.backend.delete_schedule(thermostat, schedule) {
            Ok(()) => {
                self.notify("Programmazione eliminata", NoticeKind::Success, Instant::now());
                self.reload_schedules();
                Outcome::Done
            }
            Err(e) => {
                error!("delete_schedule({}, {}) failed: {}", thermostat, schedule, e);
                self.notify("Errore nell'eliminazione", NoticeKind::Error, Instant::now());
                Outcome::Failed
            }
        }
    }

    /// Flip a schedule's active flag; `current_active` is the flag as currently displayed.
    pub fn toggle_schedule_active(&self, thermostat: ThermostatId, schedule: &ScheduleId, current_active: bool) -> Outcome {
        let Some(_busy) = self.begin() else {
            return self.refuse_busy();
        };

        match self.backend.toggle_schedule(thermostat, schedule, !current_active) {
            Ok(()) => {
                let message = if current_active {
                    "Programmazione disattivata"
                } else {
                    "Programmazione attivata"
                };
                self.notify(message, NoticeKind::Success, Instant::now());
                self.reload_schedules();
                Outcome::Done
            }
            Err(e) => {
                error!("toggle_schedule({}, {}) failed: {}", thermostat, schedule, e);
                self.notify("Errore nel cambio stato", NoticeKind::Error, Instant::now());
                Outcome::Failed
            }
        }
    }
}
