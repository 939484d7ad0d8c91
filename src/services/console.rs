//! Interactive console over the dashboard.
//!
//! Three kinds of threads feed one event channel: a stdin reader, a timer ticking once per
//! second, and short-lived workers running mutations. The timer keeps going while a request
//! is in flight, so the clock and the status poll never wait on the busy flag.

use chrono::Local;
use log::{debug, info};
use std::collections::VecDeque;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::models::office::{lookup_thermostat, parse_day, Schedule, Speed, ThermostatId};
use crate::services::dashboard::{Dashboard, Outcome, ViewState, MSG_BUSY};
use crate::services::render::{render_header, render_view};

const TICK: Duration = Duration::from_secs(1);

const HELP: &str = "\
Comandi:
  set <termostato> <OFF|V1|V2|V3>   imposta la velocità
  open <termostato>                 apre la programmazione
  close                             chiude i pannelli
  all                               mostra/nasconde tutte le programmazioni
  day <Dom..Sab|0-6>                seleziona/deseleziona un giorno
  hour <0-23> | minute <0-59>       orario della nuova programmazione
  speed <OFF|V1|V2|V3>              velocità della nuova programmazione
  once                              programmazione singola (se supportata)
  add                               aggiunge la programmazione
  del [termostato] <n>              elimina la programmazione n
  toggle [termostato] <n>           attiva/disattiva la programmazione n
  refresh                           ricarica lo stato
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(ThermostatId, Speed),
    Open(ThermostatId),
    Close,
    All,
    Day(usize),
    Hour(String),
    Minute(String),
    FormSpeed(Speed),
    Once,
    Add,
    Delete(Option<ThermostatId>, usize),
    Toggle(Option<ThermostatId>, usize),
    Refresh,
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
    /// Redraw the whole screen every tick, not just the clock line.
    pub live: bool,
}

#[derive(Debug)]
enum Event {
    Line(String),
    Eof,
    Tick { changed: bool },
    Done(Outcome),
}

fn thermostat_arg(arg: Option<&str>) -> Result<ThermostatId, String> {
    let arg = arg.ok_or_else(|| "manca il termostato".to_string())?;
    lookup_thermostat(arg)
        .map(|t| t.id)
        .ok_or_else(|| format!("termostato sconosciuto: {}", arg))
}

fn row_arg(arg: Option<&str>) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| "manca il numero della programmazione".to_string())?;
    arg.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("numero non valido: {}", arg))
}

/// `[termostato] <n>`
fn row_target(args: &[&str]) -> Result<(Option<ThermostatId>, usize), String> {
    match args {
        [row] => Ok((None, row_arg(Some(row))?)),
        [thermo, row] => Ok((Some(thermostat_arg(Some(thermo))?), row_arg(Some(row))?)),
        _ => Err("uso: del|toggle [termostato] <n>".to_string()),
    }
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = words.split_first() else {
        return Ok(Command::Nothing);
    };
    let first = args.first().copied();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "set" => {
            let id = thermostat_arg(first)?;
            let speed = args.get(1).ok_or_else(|| "manca la velocità".to_string())?.parse::<Speed>()?;
            Command::Set(id, speed)
        }
        "open" => Command::Open(thermostat_arg(first)?),
        "close" => Command::Close,
        "all" => Command::All,
        "day" => {
            let arg = first.ok_or_else(|| "manca il giorno".to_string())?;
            Command::Day(parse_day(arg).ok_or_else(|| format!("giorno non valido: {}", arg))?)
        }
        "hour" => Command::Hour(first.unwrap_or_default().to_string()),
        "minute" => Command::Minute(first.unwrap_or_default().to_string()),
        "speed" => Command::FormSpeed(first.ok_or_else(|| "manca la velocità".to_string())?.parse::<Speed>()?),
        "once" => Command::Once,
        "add" => Command::Add,
        "del" | "delete" => {
            let (thermo, row) = row_target(args)?;
            Command::Delete(thermo, row)
        }
        "toggle" => {
            let (thermo, row) = row_target(args)?;
            Command::Toggle(thermo, row)
        }
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("comando sconosciuto: {} (help per l'elenco)", other)),
    };
    Ok(cmd)
}

/// Find the schedule shown as row `row` (1-based) for `thermostat`, defaulting to the open
/// panel.
pub fn resolve_row(view: &ViewState, thermostat: Option<ThermostatId>, row: usize) -> Result<(ThermostatId, Schedule), String> {
    let id = thermostat
        .or(view.selected)
        .ok_or_else(|| "apri prima un termostato (open) o indicane uno".to_string())?;
    view.schedules
        .get(&id)
        .and_then(|list| list.get(row.checked_sub(1)?))
        .cloned()
        .map(|s| (id, s))
        .ok_or_else(|| format!("nessuna programmazione n. {} per il termostato {}", row, id))
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "s" | "si" | "sì" | "y" | "yes")
}

fn spawn_stdin(tx: Sender<Event>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::Eof);
    });
}

fn spawn_timer(dashboard: Arc<Dashboard>, tx: Sender<Event>) {
    thread::spawn(move || {
        loop {
            let tick_start = Instant::now();
            let changed = dashboard.tick(tick_start, Local::now());
            if tx.send(Event::Tick { changed }).is_err() {
                return;
            }
            // Maintain steady cadence
            let elapsed = tick_start.elapsed();
            if elapsed < TICK {
                thread::sleep(TICK - elapsed);
            }
        }
    });
}

fn spawn_action<F>(dashboard: &Arc<Dashboard>, tx: &Sender<Event>, action: F)
where
    F: FnOnce(&Dashboard) -> Outcome + Send + 'static,
{
    let dashboard = Arc::clone(dashboard);
    let tx = tx.clone();
    thread::spawn(move || {
        let outcome = action(&dashboard);
        let _ = tx.send(Event::Done(outcome));
    });
}

struct Screen {
    clear: bool,
}

impl Screen {
    fn draw(&self, dashboard: &Dashboard) {
        let view = dashboard.snapshot(Instant::now());
        let mut out = std::io::stdout().lock();
        if self.clear {
            let _ = write!(out, "\x1b[2J\x1b[H");
        }
        let _ = writeln!(out, "{}", render_view(&view, dashboard.capabilities(), dashboard.base_url()));
        let _ = write!(out, "> ");
        let _ = out.flush();
    }

    /// Repaint the first line in place; cursor and typed input stay where they are.
    fn draw_clock(&self, dashboard: &Dashboard) {
        let view = dashboard.snapshot(Instant::now());
        let Some(header) = render_header(&view).into_iter().next() else {
            return;
        };
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\x1b7\x1b[1;1H\x1b[2K{}\x1b8", header);
        let _ = out.flush();
    }

    fn say(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{}\n> ", message);
        let _ = out.flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redraw {
    Full,
    /// Rewrite only the header line holding the clock.
    Clock,
    Nothing,
}

/// What a timer tick repaints. A terminal always gets at least the clock.
fn tick_redraw(changed: bool, live: bool, terminal: bool) -> Redraw {
    if changed || live {
        Redraw::Full
    } else if terminal {
        Redraw::Clock
    } else {
        Redraw::Nothing
    }
}

/// Wait for the next line from stdin. Anything else that arrives meanwhile is kept in
/// `backlog`, except clock-only ticks.
fn ask(rx: &Receiver<Event>, question: &str, backlog: &mut VecDeque<Event>) -> bool {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{} [s/N] ", question);
    let _ = out.flush();
    drop(out);
    loop {
        match rx.recv() {
            Ok(Event::Line(answer)) => return is_yes(&answer),
            Ok(Event::Eof) => {
                backlog.push_back(Event::Eof);
                return false;
            }
            Err(_) => return false,
            Ok(Event::Tick { changed: false }) => continue,
            Ok(event) => backlog.push_back(event),
        }
    }
}

pub fn run(dashboard: Arc<Dashboard>, options: ConsoleOptions) -> Result<(), String> {
    let screen = Screen {
        clear: std::io::stdout().is_terminal(),
    };
    let (tx, rx) = mpsc::channel();

    dashboard.mount(Instant::now());
    spawn_stdin(tx.clone());
    spawn_timer(Arc::clone(&dashboard), tx.clone());
    screen.draw(&dashboard);
    info!("Console ready; type `help` for commands");

    let mut backlog = VecDeque::new();
    loop {
        let event = match backlog.pop_front() {
            Some(event) => event,
            None => rx.recv().map_err(|e| format!("console event channel closed: {}", e))?,
        };
        match event {
            Event::Tick { changed } => match tick_redraw(changed, options.live, screen.clear) {
                Redraw::Full => screen.draw(&dashboard),
                Redraw::Clock => screen.draw_clock(&dashboard),
                Redraw::Nothing => {}
            },
            Event::Done(outcome) => {
                debug!("Action finished: {:?}", outcome);
                screen.draw(&dashboard);
            }
            Event::Eof => return Ok(()),
            Event::Line(line) => match parse_command(&line) {
                Ok(Command::Quit) => return Ok(()),
                Ok(Command::Nothing) => screen.say(""),
                Ok(Command::Help) => screen.say(HELP),
                Ok(cmd) => {
                    if let Err(msg) = dispatch(cmd, &dashboard, &tx, &rx, &mut backlog) {
                        screen.say(&msg);
                    } else {
                        screen.draw(&dashboard);
                    }
                }
                Err(msg) => screen.say(&msg),
            },
        }
    }
}

fn dispatch(
    cmd: Command,
    dashboard: &Arc<Dashboard>,
    tx: &Sender<Event>,
    rx: &Receiver<Event>,
    backlog: &mut VecDeque<Event>,
) -> Result<(), String> {
    let is_mutation = matches!(
        cmd,
        Command::Set(..) | Command::Add | Command::Delete(..) | Command::Toggle(..)
    );
    if is_mutation && dashboard.is_busy() {
        return Err(MSG_BUSY.to_string());
    }

    match cmd {
        Command::Set(id, speed) => spawn_action(dashboard, tx, move |d| d.set_speed(id, speed)),
        Command::Open(id) => {
            dashboard.show_all(false);
            dashboard.select(Some(id));
        }
        Command::Close => {
            dashboard.select(None);
            dashboard.show_all(false);
        }
        Command::All => {
            let showing = dashboard.snapshot(Instant::now()).show_all;
            dashboard.show_all(!showing);
        }
        Command::Day(day) => dashboard.edit_form(|f| f.toggle_day(day)),
        Command::Hour(hour) => dashboard.edit_form(|f| f.hour = hour),
        Command::Minute(minute) => dashboard.edit_form(|f| f.minute = minute),
        Command::FormSpeed(speed) => dashboard.edit_form(|f| f.speed = speed),
        Command::Once => {
            if !dashboard.capabilities().one_time {
                return Err("programmazione singola non supportata da questo backend".to_string());
            }
            dashboard.edit_form(|f| f.one_time = !f.one_time);
        }
        Command::Add => spawn_action(dashboard, tx, |d| d.submit_form()),
        Command::Delete(thermo, row) => {
            let (id, schedule) = resolve_row(&dashboard.snapshot(Instant::now()), thermo, row)?;
            if ask(rx, "Eliminare questa programmazione?", backlog) {
                spawn_action(dashboard, tx, move |d| d.delete_schedule(id, &schedule.id, &|_: &str| true));
            } else {
                dashboard.delete_schedule(id, &schedule.id, &|_: &str| false);
            }
        }
        Command::Toggle(thermo, row) => {
            let (id, schedule) = resolve_row(&dashboard.snapshot(Instant::now()), thermo, row)?;
            spawn_action(dashboard, tx, move |d| {
                d.toggle_schedule_active(id, &schedule.id, schedule.active)
            });
        }
        Command::Refresh => spawn_action(dashboard, tx, |d| {
            d.reload_schedules();
            d.refresh_status();
            Outcome::Done
        }),
        Command::Help | Command::Quit | Command::Nothing => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::office::{empty_schedule_map, ScheduleId, StatusMap, Weekdays};
    use crate::services::dashboard::ScheduleForm;

    #[test]
    fn parses_speed_commands() {
        assert_eq!(parse_command("set 3 v2"), Ok(Command::Set(ThermostatId(3), Speed::V2)));
        assert_eq!(parse_command("SET federico off"), Ok(Command::Set(ThermostatId(1), Speed::Off)));
        assert!(parse_command("set 3").is_err());
        assert!(parse_command("set 12 V1").is_err());
        assert!(parse_command("set 3 V4").is_err());
    }

    #[test]
    fn parses_form_commands() {
        assert_eq!(parse_command("day Sab"), Ok(Command::Day(6)));
        assert_eq!(parse_command("day 0"), Ok(Command::Day(0)));
        assert!(parse_command("day Xyz").is_err());
        assert_eq!(parse_command("hour 7"), Ok(Command::Hour("7".into())));
        assert_eq!(parse_command("minute"), Ok(Command::Minute(String::new())));
        assert_eq!(parse_command("speed V3"), Ok(Command::FormSpeed(Speed::V3)));
        assert_eq!(parse_command("   "), Ok(Command::Nothing));
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn parses_row_targets() {
        assert_eq!(parse_command("del 2"), Ok(Command::Delete(None, 2)));
        assert_eq!(
            parse_command("toggle Ingresso 1"),
            Ok(Command::Toggle(Some(ThermostatId(6)), 1))
        );
        assert!(parse_command("del 0").is_err());
        assert!(parse_command("del").is_err());
        assert!(parse_command("toggle a b c").is_err());
    }

    #[test]
    fn resolves_rows_against_open_panel() {
        let mut schedules = empty_schedule_map();
        schedules.insert(
            ThermostatId(2),
            vec![Schedule {
                id: ScheduleId("a1".into()),
                days: Weekdays::from_indexes([1]),
                hour: 7,
                minute: 0,
                speed: Speed::V1,
                active: false,
                one_time: false,
            }],
        );
        let mut view = ViewState {
            schedules,
            status: StatusMap::new(),
            notification: None,
            selected: None,
            show_all: false,
            form: ScheduleForm::default(),
            clock: Local::now(),
            busy: false,
        };

        assert!(resolve_row(&view, None, 1).is_err());
        let (id, s) = resolve_row(&view, Some(ThermostatId(2)), 1).unwrap();
        assert_eq!((id, s.id.0.as_str()), (ThermostatId(2), "a1"));

        view.selected = Some(ThermostatId(2));
        assert!(resolve_row(&view, None, 1).is_ok());
        assert!(resolve_row(&view, None, 2).is_err());
        assert!(resolve_row(&view, Some(ThermostatId(3)), 1).is_err());
    }

    #[test]
    fn every_tick_repaints_at_least_the_clock_on_a_terminal() {
        assert_eq!(tick_redraw(false, false, true), Redraw::Clock);
        assert_eq!(tick_redraw(true, false, true), Redraw::Full);
        assert_eq!(tick_redraw(false, true, true), Redraw::Full);
        assert_eq!(tick_redraw(false, false, false), Redraw::Nothing);
        assert_eq!(tick_redraw(true, false, false), Redraw::Full);
    }

    #[test]
    fn events_during_confirmation_are_kept() {
        let (tx, rx) = mpsc::channel();
        tx.send(Event::Tick { changed: false }).unwrap();
        tx.send(Event::Tick { changed: true }).unwrap();
        tx.send(Event::Done(Outcome::Done)).unwrap();
        tx.send(Event::Line("s".into())).unwrap();

        let mut backlog = VecDeque::new();
        assert!(ask(&rx, "Eliminare?", &mut backlog));
        assert_eq!(backlog.len(), 2);
        assert!(matches!(backlog[0], Event::Tick { changed: true }));
        assert!(matches!(backlog[1], Event::Done(Outcome::Done)));

        tx.send(Event::Eof).unwrap();
        let mut backlog = VecDeque::new();
        assert!(!ask(&rx, "Eliminare?", &mut backlog));
        assert!(matches!(backlog.pop_front(), Some(Event::Eof)));
    }

    #[test]
    fn confirmation_answers() {
        assert!(is_yes("s"));
        assert!(is_yes(" Sì "));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
