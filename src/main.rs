pub mod models {
    pub mod office;
}

pub mod client;
pub mod config;
pub mod env_file;
pub mod utils;
pub mod services {
    pub mod console;
    pub mod dashboard;
    pub mod oneshot;
    pub mod render;
}

use crate::config::{BackendKind, Config};
use crate::models::office::Speed;
use crate::services::console::{self, ConsoleOptions};
use crate::services::dashboard::{Dashboard, ScheduleForm};
use crate::services::oneshot;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "office-thermostats", version, about = "Fan speed and schedules for the office thermostats")]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Backend to talk to (overrides THERMO_BACKEND)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    /// API base URL (overrides THERMO_API_BASE)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive dashboard (default)
    Console {
        /// Redraw the whole screen every second, not just the clock
        #[arg(long)]
        live: bool,
    },
    /// List the registered thermostats
    Thermostats,
    /// Grid of thermostats with schedule preview and, if available, current speed
    Status,
    /// Set a thermostat's fan speed
    Set {
        /// Thermostat id or name
        thermostat: String,
        /// OFF, V1, V2, V3 or 0-3
        speed: Speed,
    },
    /// Show schedules of one thermostat, or of all
    Schedules {
        thermostat: Option<String>,
    },
    /// Add a schedule
    Add {
        thermostat: String,
        /// Comma separated days: Dom,Lun,... or 0-6 (0 = Sunday)
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        #[arg(long, default_value = "")]
        hour: String,
        #[arg(long, default_value = "")]
        minute: String,
        #[arg(long, default_value = "OFF")]
        speed: Speed,
        /// Run once instead of every week (cloud backend only)
        #[arg(long)]
        once: bool,
    },
    /// Delete a schedule by its row number
    Delete {
        thermostat: String,
        row: usize,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Enable or disable a schedule by its row number
    Toggle {
        thermostat: String,
        row: usize,
    },
}

fn schedule_form(days: &[String], hour: String, minute: String, speed: Speed, once: bool) -> Result<ScheduleForm, String> {
    let mut form = ScheduleForm {
        hour,
        minute,
        speed,
        one_time: once,
        ..ScheduleForm::default()
    };
    for day in days.iter().filter(|d| !d.trim().is_empty()) {
        let idx = models::office::parse_day(day).ok_or_else(|| format!("invalid day `{}`", day))?;
        if !form.days.contains(&idx) {
            form.toggle_day(idx);
        }
    }
    Ok(form)
}

fn run(cli: Cli) -> Result<(), String> {
    let command = cli.command.unwrap_or(Command::Console { live: false });
    if let Command::Thermostats = command {
        oneshot::thermostats();
        return Ok(());
    }

    let cfg = Config::from_env(cli.backend, cli.base_url)?;
    info!(
        "Config loaded (backend={:?}, api_base={}, status_poll={}s, settle={}ms, notification={}s, timeout={})",
        cfg.backend,
        cfg.api_base,
        cfg.status_poll_interval.as_secs(),
        cfg.status_settle_delay.as_millis(),
        cfg.notification_ttl.as_secs(),
        cfg.request_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "-".to_string()),
    );
    let dashboard = Dashboard::new(cfg.build_backend(), cfg.dashboard_settings());

    match command {
        Command::Console { live } => console::run(Arc::new(dashboard), ConsoleOptions { live }),
        Command::Thermostats => Ok(()),
        Command::Status => oneshot::status(&dashboard),
        Command::Set { thermostat, speed } => oneshot::set(&dashboard, &thermostat, speed),
        Command::Schedules { thermostat } => oneshot::schedules(&dashboard, thermostat.as_deref()),
        Command::Add {
            thermostat,
            days,
            hour,
            minute,
            speed,
            once,
        } => {
            let form = schedule_form(&days, hour, minute, speed, once)?;
            oneshot::add(&dashboard, &thermostat, form)
        }
        Command::Delete { thermostat, row, yes } => oneshot::delete(&dashboard, &thermostat, row, yes),
        Command::Toggle { thermostat, row } => oneshot::toggle(&dashboard, &thermostat, row),
    }
}

fn main() {
    let cli = Cli::parse();

    let loaded_env = match env_file::load(cli.env_file.as_deref()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!(
            "Environment loaded from {} .env file: {} ({} variable(s) applied)",
            origin,
            info.path.display(),
            info.applied
        );
    }

    info!(
        "office-thermostats {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_arguments() {
        let cli = Cli::try_parse_from([
            "office-thermostats",
            "--backend",
            "cloud",
            "add",
            "Martina",
            "--days",
            "Lun,sab,1",
            "--hour",
            "7",
            "--minute",
            "5",
            "--speed",
            "v2",
            "--once",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Cloud));
        let Some(Command::Add {
            days,
            hour,
            minute,
            speed,
            once,
            ..
        }) = cli.command
        else {
            panic!("expected add");
        };
        let form = schedule_form(&days, hour, minute, speed, once).unwrap();
        assert_eq!(form.days, vec![1, 6]);
        assert_eq!((form.hour.as_str(), form.minute.as_str()), ("7", "5"));
        assert_eq!(form.speed, Speed::V2);
        assert!(form.one_time);
    }

    #[test]
    fn rejects_bad_speed_and_day() {
        assert!(Cli::try_parse_from(["office-thermostats", "set", "1", "V7"]).is_err());
        assert!(schedule_form(&["Xyz".to_string()], String::new(), String::new(), Speed::Off, false).is_err());
    }

    #[test]
    fn console_is_default() {
        let cli = Cli::try_parse_from(["office-thermostats", "--base-url", "http://c:8086"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.base_url.as_deref(), Some("http://c:8086"));
    }
}
