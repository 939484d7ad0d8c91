use crate::models::office::{Schedule, Weekdays, DAY_NAMES};
use chrono::{DateTime, Locale, TimeZone};
use std::fmt::Display;

/// Schedules shown on a thermostat card before collapsing into a count.
pub const PREVIEW_LEN: usize = 2;

/// Active days as Italian abbreviations, e.g. `"Lun, Sab"`.
pub fn format_days(days: &Weekdays) -> String {
    days.0
        .iter()
        .zip(DAY_NAMES)
        .filter_map(|(active, name)| active.then_some(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Zero-padded `HH:MM`.
pub fn format_time(hour: u8, minute: u8) -> String {
    format!("{:02}:{:02}", hour, minute)
}

/// Card preview: the first [`PREVIEW_LEN`] schedules plus how many were left out.
pub fn schedule_preview(schedules: &[Schedule]) -> (&[Schedule], Option<usize>) {
    if schedules.len() > PREVIEW_LEN {
        (&schedules[..PREVIEW_LEN], Some(schedules.len() - PREVIEW_LEN))
    } else {
        (schedules, None)
    }
}

/// Header clock, e.g. `("domenica 18 ottobre 2026", "09:41:07")`.
pub fn format_clock<Tz>(now: &DateTime<Tz>) -> (String, String)
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    (
        now.format_localized("%A %d %B %Y", Locale::it_IT).to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::office::{ScheduleId, Speed};
    use chrono::{FixedOffset, TimeZone};

    fn sched(idx: usize) -> Schedule {
        Schedule {
            id: ScheduleId::from_index(idx),
            days: Weekdays::from_indexes([1]),
            hour: 8,
            minute: 0,
            speed: Speed::V1,
            active: true,
            one_time: false,
        }
    }

    #[test]
    fn days_are_listed_in_week_order() {
        let days = Weekdays([false, true, false, false, false, false, true]);
        assert_eq!(format_days(&days), "Lun, Sab");
        assert_eq!(format_days(&Weekdays([true; 7])), "Dom, Lun, Mar, Mer, Gio, Ven, Sab");
        assert_eq!(format_days(&Weekdays::default()), "");
    }

    #[test]
    fn time_is_zero_padded() {
        assert_eq!(format_time(7, 5), "07:05");
        assert_eq!(format_time(0, 0), "00:00");
        assert_eq!(format_time(23, 59), "23:59");
    }

    #[test]
    fn preview_caps_at_two_with_overflow_count() {
        let none: Vec<Schedule> = Vec::new();
        assert_eq!(schedule_preview(&none), (&none[..], None));

        let two: Vec<Schedule> = (0..2).map(sched).collect();
        let (shown, more) = schedule_preview(&two);
        assert_eq!(shown.len(), 2);
        assert_eq!(more, None);

        let five: Vec<Schedule> = (0..5).map(sched).collect();
        let (shown, more) = schedule_preview(&five);
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].id, ScheduleId::from_index(1));
        assert_eq!(more, Some(3));
    }

    #[test]
    fn clock_uses_italian_names() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 17, 9, 41, 7).unwrap();
        let (date, time) = format_clock(&now);
        assert_eq!(date, "sabato 17 ottobre 2026");
        assert_eq!(time, "09:41:07");
    }
}
