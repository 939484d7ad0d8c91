//! Plain-text rendering of the dashboard view.

use colored::{ColoredString, Colorize};

use crate::client::Capabilities;
use crate::models::office::{find_thermostat, Schedule, Speed, Thermostat, DAY_NAMES, THERMOSTATS};
use crate::services::dashboard::{NoticeKind, ScheduleForm, ViewState};
use crate::utils::{format_clock, format_days, format_time, schedule_preview};

const TITLE: &str = "Controllo Termostati Ufficio";

pub fn speed_badge(speed: Speed) -> ColoredString {
    let (r, g, b) = speed.rgb();
    speed.label().truecolor(r, g, b).bold()
}

/// Whole screen: header, notification, grid, open panels, footer.
pub fn render_view(view: &ViewState, caps: Capabilities, base_url: &str) -> String {
    let mut lines = Vec::new();
    lines.extend(render_header(view));
    lines.push(render_legend());
    lines.push(String::new());
    for thermo in &THERMOSTATS {
        lines.extend(render_card(thermo, view));
    }

    if let Some(thermo) = view.selected.and_then(find_thermostat) {
        lines.push(String::new());
        lines.extend(render_panel(thermo, view, caps));
    }
    if view.show_all {
        lines.push(String::new());
        lines.extend(render_all(view));
    }

    lines.push(String::new());
    lines.push(format!("Connesso a: {}", base_url).dimmed().to_string());
    lines.join("\n")
}

pub fn render_legend() -> String {
    let badges = Speed::ALL.iter().map(|s| speed_badge(*s).to_string()).collect::<Vec<_>>();
    format!("Velocità: {}", badges.join(" "))
}

pub fn render_header(view: &ViewState) -> Vec<String> {
    let (date, time) = format_clock(&view.clock);
    let mut lines = vec![format!("{}  {} {}", TITLE.bold(), date, time.bold())];
    if view.busy {
        lines.push("… operazione in corso".yellow().to_string());
    }
    if let Some(n) = &view.notification {
        let text = match n.kind {
            NoticeKind::Success => n.message.green(),
            NoticeKind::Error => n.message.red(),
        };
        lines.push(format!("» {}", text));
    }
    lines
}

/// One grid card: name, last known speed and the schedule preview.
pub fn render_card(thermo: &Thermostat, view: &ViewState) -> Vec<String> {
    let status = match view.status.get(&thermo.id) {
        Some(speed) => format!(" [{}]", speed_badge(*speed)),
        None => String::new(),
    };
    let mut lines = vec![format!("{:>2} {:<12}{}", thermo.id.0, thermo.name.bold(), status)];

    let schedules = view.schedules.get(&thermo.id).map(Vec::as_slice).unwrap_or_default();
    let (shown, more) = schedule_preview(schedules);
    for s in shown {
        lines.push(format!("     {} {}", format_time(s.hour, s.minute), speed_badge(s.speed)));
    }
    if let Some(n) = more {
        lines.push(format!("     +{} altre", n));
    }
    lines
}

/// Numbered rows; the number is what `del`/`toggle` take.
pub fn render_schedule_rows(schedules: &[Schedule]) -> Vec<String> {
    schedules
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let marker = if s.active { "[x]" } else { "[ ]" };
            let once = if s.one_time { " (una volta)" } else { "" };
            let row = format!(
                "  {:>2}. {} {:<28} {} {}{}",
                idx + 1,
                marker,
                format_days(&s.days),
                format_time(s.hour, s.minute),
                speed_badge(s.speed),
                once
            );
            if s.active { row } else { row.dimmed().to_string() }
        })
        .collect()
}

pub fn render_panel(thermo: &Thermostat, view: &ViewState, caps: Capabilities) -> Vec<String> {
    let mut lines = vec![format!("Programmazione {}", thermo.name).bold().underline().to_string()];
    lines.push(format!("  Aggiungi: {}", render_form(&view.form, caps)));

    let schedules = view.schedules.get(&thermo.id).map(Vec::as_slice).unwrap_or_default();
    if schedules.is_empty() {
        lines.push("  Nessuna programmazione".italic().to_string());
    } else {
        lines.extend(render_schedule_rows(schedules));
    }
    lines
}

pub fn render_form(form: &ScheduleForm, caps: Capabilities) -> String {
    let days = DAY_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if form.days.contains(&idx) {
                name.reversed().to_string()
            } else {
                name.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let blank = |v: &str| if v.is_empty() { String::from("--") } else { v.to_string() };
    let mut out = format!(
        "{}  ore {}:{}  velocità {}",
        days,
        blank(&form.hour),
        blank(&form.minute),
        speed_badge(form.speed)
    );
    if caps.one_time {
        out.push_str(if form.one_time { "  una volta: sì" } else { "  una volta: no" });
    }
    out
}

pub fn render_all(view: &ViewState) -> Vec<String> {
    let mut lines = vec!["Tutte le Programmazioni".bold().underline().to_string()];
    let mut any = false;
    for thermo in &THERMOSTATS {
        let Some(schedules) = view.schedules.get(&thermo.id).filter(|s| !s.is_empty()) else {
            continue;
        };
        any = true;
        lines.push(format!("{} ({})", thermo.name.bold(), thermo.id));
        lines.extend(render_schedule_rows(schedules));
    }
    if !any {
        lines.push("Nessuna programmazione configurata".italic().to_string());
    }
    lines
}
