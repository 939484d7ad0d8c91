//! Domain types shared by both backends and the dashboard.
//!
//! Notes
//! - The thermostat registry is static; backends only report schedules and status.
//! - Weekday index 0 is Sunday, matching both wire contracts.
//! - Schedule ids are opaque strings scoped to their owning thermostat.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThermostatId(pub u8);

impl fmt::Display for ThermostatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a schedule within its thermostat.
///
/// The local controller addresses schedules by array position, the cloud gateway by a
/// server-assigned id. Both are carried as strings so the dashboard never has to care.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub String);

impl ScheduleId {
    pub fn from_index(index: usize) -> Self {
        ScheduleId(index.to_string())
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =====================
// Thermostat registry
// =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thermostat {
    pub id: ThermostatId,
    pub name: &'static str,
    /// Serial port of the bus the device hangs off.
    pub serial: &'static str,
    /// Bus address of the device.
    pub address: u16,
    pub position: u8,
}

const fn thermostat(id: u8, name: &'static str, address: u16) -> Thermostat {
    Thermostat {
        id: ThermostatId(id),
        name,
        serial: "ttyS1",
        address,
        position: 1,
    }
}

pub const THERMOSTATS: [Thermostat; 8] = [
    thermostat(0, "Martina", 151),
    thermostat(1, "Federico", 157),
    thermostat(2, "Michele", 153),
    thermostat(3, "Franco", 152),
    thermostat(4, "Corridoio", 158),
    thermostat(5, "Commerciale", 155),
    thermostat(6, "Ingresso", 154),
    thermostat(7, "Federica", 159),
];

pub fn find_thermostat(id: ThermostatId) -> Option<&'static Thermostat> {
    THERMOSTATS.iter().find(|t| t.id == id)
}

/// Resolve user input to a thermostat: either the numeric id or the name (case-insensitive).
pub fn lookup_thermostat(input: &str) -> Option<&'static Thermostat> {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<u8>() {
        return find_thermostat(ThermostatId(n));
    }
    THERMOSTATS.iter().find(|t| t.name.eq_ignore_ascii_case(trimmed))
}

// =====================
// Speed
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Speed {
    // 0=OFF, 1=V1, 2=V2, 3=V3
    #[default]
    Off,
    V1,
    V2,
    V3,
}

impl Speed {
    pub const ALL: [Speed; 4] = [Speed::Off, Speed::V1, Speed::V2, Speed::V3];

    pub fn level(self) -> u8 {
        match self {
            Speed::Off => 0,
            Speed::V1 => 1,
            Speed::V2 => 2,
            Speed::V3 => 3,
        }
    }

    pub fn from_level(level: u64) -> Option<Speed> {
        match level {
            0 => Some(Speed::Off),
            1 => Some(Speed::V1),
            2 => Some(Speed::V2),
            3 => Some(Speed::V3),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Speed::Off => "OFF",
            Speed::V1 => "V1",
            Speed::V2 => "V2",
            Speed::V3 => "V3",
        }
    }

    /// Display colour, `#dc3545` `#28a745` `#ffc107` `#17a2b8` for OFF..V3.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Speed::Off => (0xdc, 0x35, 0x45),
            Speed::V1 => (0x28, 0xa7, 0x45),
            Speed::V2 => (0xff, 0xc1, 0x07),
            Speed::V3 => (0x17, 0xa2, 0xb8),
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u64>() {
            return Speed::from_level(n).ok_or_else(|| format!("speed level out of range: {}", n));
        }
        Speed::ALL
            .into_iter()
            .find(|sp| sp.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown speed: {}", trimmed))
    }
}

impl serde::Serialize for Speed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.level())
    }
}

impl<'de> serde::Deserialize<'de> for Speed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = Speed;

            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "an integer 0, 1, 2 or 3 for Speed")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(value)
                    .ok()
                    .and_then(Speed::from_level)
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Signed(value), &self))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Speed::from_level(value).ok_or_else(|| E::invalid_value(serde::de::Unexpected::Unsigned(value), &self))
            }
        }

        deserializer.deserialize_any(V)
    }
}

// =====================
// Weekdays
// =====================

pub const DAY_NAMES: [&str; 7] = ["Dom", "Lun", "Mar", "Mer", "Gio", "Ven", "Sab"];

/// Day-of-week selection, index 0 = Sunday.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weekdays(pub [bool; 7]);

impl Weekdays {
    pub fn from_indexes<I: IntoIterator<Item = usize>>(indexes: I) -> Self {
        let mut days = [false; 7];
        for idx in indexes {
            if let Some(slot) = days.get_mut(idx) {
                *slot = true;
            }
        }
        Weekdays(days)
    }

    pub fn indexes(&self) -> Vec<usize> {
        self.0.iter().enumerate().filter(|(_, on)| **on).map(|(idx, _)| idx).collect()
    }
}

/// Parse a day given as index (0-6) or Italian abbreviation ("Lun").
pub fn parse_day(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        return (n < 7).then_some(n);
    }
    DAY_NAMES.iter().position(|d| d.eq_ignore_ascii_case(trimmed))
}

// =====================
// Schedules and status
// =====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: ScheduleId,
    pub days: Weekdays,
    pub hour: u8,
    pub minute: u8,
    pub speed: Speed,
    pub active: bool,
    /// Deleted server-side after it fires once.
    pub one_time: bool,
}

/// Payload of an add request, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub days: Weekdays,
    pub hour: u8,
    pub minute: u8,
    pub speed: Speed,
    pub one_time: bool,
}

pub type ScheduleMap = BTreeMap<ThermostatId, Vec<Schedule>>;
pub type StatusMap = BTreeMap<ThermostatId, Speed>;

/// One entry per registered thermostat, all empty.
pub fn empty_schedule_map() -> ScheduleMap {
    THERMOSTATS.iter().map(|t| (t.id, Vec::new())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_parses_labels_and_levels() {
        assert_eq!("v2".parse::<Speed>(), Ok(Speed::V2));
        assert_eq!("OFF".parse::<Speed>(), Ok(Speed::Off));
        assert_eq!("3".parse::<Speed>(), Ok(Speed::V3));
        assert!("4".parse::<Speed>().is_err());
        assert!("turbo".parse::<Speed>().is_err());
    }

    #[test]
    fn speed_wire_format_is_integer() {
        assert_eq!(serde_json::to_string(&Speed::V1).unwrap(), "1");
        let s: Speed = serde_json::from_str("2").unwrap();
        assert_eq!(s, Speed::V2);
        assert!(serde_json::from_str::<Speed>("3.0").is_err());
        assert!(serde_json::from_str::<Speed>("7").is_err());
        assert!(serde_json::from_str::<Speed>("-1").is_err());
    }

    #[test]
    fn registry_lookup_by_id_and_name() {
        assert_eq!(lookup_thermostat("4").map(|t| t.name), Some("Corridoio"));
        assert_eq!(lookup_thermostat("federica").map(|t| t.address), Some(159));
        assert!(lookup_thermostat("8").is_none());
        assert!(lookup_thermostat("Cucina").is_none());
    }

    #[test]
    fn weekday_helpers() {
        let days = Weekdays::from_indexes([6, 1, 9]);
        assert_eq!(days.indexes(), vec![1, 6]);
        assert!(Weekdays::default().indexes().is_empty());
        assert_eq!(parse_day("sab"), Some(6));
        assert_eq!(parse_day("0"), Some(0));
        assert_eq!(parse_day("7"), None);
    }

    #[test]
    fn empty_map_covers_registry() {
        let map = empty_schedule_map();
        assert_eq!(map.len(), THERMOSTATS.len());
        assert!(map.values().all(Vec::is_empty));
    }
}
