//! Non-interactive subcommands: one action, its notification on stdout, then exit.

use colored::Colorize;
use log::info;
use std::io::Write;
use std::time::Instant;

use crate::models::office::{lookup_thermostat, Schedule, Speed, Thermostat, ThermostatId, THERMOSTATS};
use crate::services::console::{is_yes, resolve_row};
use crate::services::dashboard::{Dashboard, NoticeKind, Outcome, ScheduleForm};
use crate::services::render::{render_all, render_card, render_panel};

fn thermostat(arg: &str) -> Result<&'static Thermostat, String> {
    lookup_thermostat(arg).ok_or_else(|| format!("unknown thermostat `{}` (see `thermostats`)", arg))
}

/// Print the action's notification; anything but `Done` becomes an error.
fn finish(dashboard: &Dashboard, outcome: Outcome) -> Result<(), String> {
    let notice = dashboard.notification_at(Instant::now());
    if let Some(n) = &notice {
        match n.kind {
            NoticeKind::Success => println!("{}", n.message.green()),
            NoticeKind::Error => println!("{}", n.message.red()),
        }
    }
    match outcome {
        Outcome::Done => Ok(()),
        Outcome::Cancelled => {
            println!("Annullato");
            Ok(())
        }
        other => Err(notice.map(|n| n.message).unwrap_or_else(|| format!("action ended as {:?}", other))),
    }
}

pub fn thermostats() {
    println!("{:>2}  {:<12} {:<7} {:>7}  pos", "id", "nome", "seriale", "addr");
    for t in &THERMOSTATS {
        println!("{:>2}  {:<12} {:<7} {:>7}  {}", t.id.0, t.name, t.serial, t.address, t.position);
    }
}

pub fn status(dashboard: &Dashboard) -> Result<(), String> {
    dashboard.mount(Instant::now());
    if !dashboard.capabilities().status {
        info!("Backend `{}` has no status feed; showing schedules only", dashboard.backend_name());
    }
    let view = dashboard.snapshot(Instant::now());
    for t in &THERMOSTATS {
        for line in render_card(t, &view) {
            println!("{}", line);
        }
    }
    Ok(())
}

pub fn set(dashboard: &Dashboard, thermo: &str, speed: Speed) -> Result<(), String> {
    let t = thermostat(thermo)?;
    let outcome = dashboard.set_speed(t.id, speed);
    finish(dashboard, outcome)
}

pub fn schedules(dashboard: &Dashboard, thermo: Option<&str>) -> Result<(), String> {
    let selected = thermo.map(thermostat).transpose()?;
    dashboard.mount(Instant::now());
    let view = dashboard.snapshot(Instant::now());
    let lines = match selected {
        Some(t) => render_panel(t, &view, dashboard.capabilities()),
        None => render_all(&view),
    };
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

pub fn add(dashboard: &Dashboard, thermo: &str, form: ScheduleForm) -> Result<(), String> {
    let t = thermostat(thermo)?;
    let outcome = dashboard.add_schedule(t.id, &form);
    finish(dashboard, outcome)
}

fn prompt_yes(question: &str) -> Result<bool, String> {
    print!("{} [s/N] ", question);
    std::io::stdout().flush().map_err(|e| format!("stdout: {}", e))?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| format!("reading confirmation failed: {}", e))?;
    Ok(is_yes(&answer))
}

pub fn delete(dashboard: &Dashboard, thermo: &str, row: usize, assume_yes: bool) -> Result<(), String> {
    let (id, schedule) = row_of(dashboard, thermo, row)?;
    let outcome = if assume_yes {
        dashboard.delete_schedule(id, &schedule.id, &|_: &str| true)
    } else {
        let confirm = |question: &str| prompt_yes(question).unwrap_or(false);
        dashboard.delete_schedule(id, &schedule.id, &confirm)
    };
    finish(dashboard, outcome)
}

pub fn toggle(dashboard: &Dashboard, thermo: &str, row: usize) -> Result<(), String> {
    let (id, schedule) = row_of(dashboard, thermo, row)?;
    let outcome = dashboard.toggle_schedule_active(id, &schedule.id, schedule.active);
    finish(dashboard, outcome)
}

fn row_of(
    dashboard: &Dashboard,
    thermo: &str,
    row: usize,
) -> Result<(ThermostatId, Schedule), String> {
    let t = thermostat(thermo)?;
    dashboard.mount(Instant::now());
    resolve_row(&dashboard.snapshot(Instant::now()), Some(t.id), row)
}
