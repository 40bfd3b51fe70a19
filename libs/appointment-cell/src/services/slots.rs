// libs/appointment-cell/src/services/slots.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::debug;

use shared_config::ClinicHours;

use crate::models::{SchedulingError, Slot};

/// Produces the fixed-step slot grid for a clinic day and validates
/// requested booking windows against the same operating hours.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    hours: ClinicHours,
}

impl SlotGenerator {
    pub fn new(hours: ClinicHours) -> Self {
        Self { hours }
    }

    pub fn hours(&self) -> &ClinicHours {
        &self.hours
    }

    pub fn default_duration(&self) -> i64 {
        self.hours.slot_minutes
    }

    /// Length of the operating day; no booking or slot can be longer.
    pub fn max_duration(&self) -> i64 {
        (self.hours.close - self.hours.open).num_minutes()
    }

    /// Opening and closing instants for `date`, or `None` on a closed day.
    pub fn operating_window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.hours.is_open_on(date.weekday()) {
            return None;
        }
        Some((
            date.and_time(self.hours.open).and_utc(),
            date.and_time(self.hours.close).and_utc(),
        ))
    }

    /// Chronological slots of `duration_minutes` starting at opening time;
    /// the last slot ends at or before closing.
    pub fn generate(&self, date: NaiveDate, duration_minutes: i64) -> Result<Vec<Slot>, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "Slot duration must be greater than zero".to_string(),
            ));
        }
        if duration_minutes > self.max_duration() {
            return Err(SchedulingError::Validation(format!(
                "Slot duration cannot exceed the {}-minute operating day",
                self.max_duration()
            )));
        }

        let Some((open, close)) = self.operating_window(date) else {
            debug!("Clinic closed on {}, no slots", date);
            return Ok(Vec::new());
        };

        let step = Duration::minutes(duration_minutes);
        let mut slots = Vec::new();
        let mut current = open;

        while current + step <= close {
            slots.push(Slot::new(current, duration_minutes));
            current += step;
        }

        debug!("Generated {} slots of {} minutes for {}", slots.len(), duration_minutes, date);
        Ok(slots)
    }

    /// A booking must start in the future and fit inside one day's operating window.
    pub fn validate_request(
        &self,
        start: DateTime<Utc>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::InvalidSlot(
                "Appointment duration must be greater than zero".to_string(),
            ));
        }
        if duration_minutes > self.max_duration() {
            return Err(SchedulingError::InvalidSlot(format!(
                "Appointment duration cannot exceed the {}-minute operating day",
                self.max_duration()
            )));
        }

        if start <= now {
            return Err(SchedulingError::InvalidSlot(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }

        let Some((open, close)) = self.operating_window(start.date_naive()) else {
            return Err(SchedulingError::InvalidSlot(format!(
                "The clinic is closed on {}",
                start.weekday()
            )));
        };

        let end = start
            .checked_add_signed(Duration::minutes(duration_minutes))
            .ok_or_else(|| SchedulingError::InvalidSlot("Appointment end is out of range".to_string()))?;
        if start < open || end > close {
            return Err(SchedulingError::InvalidSlot(format!(
                "Appointments must fall between {} and {} UTC",
                self.hours.open.format("%H:%M"),
                self.hours.close.format("%H:%M")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Weekday};

    fn generator() -> SlotGenerator {
        SlotGenerator::new(ClinicHours::default())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn default_day_has_twenty_half_hour_slots() {
        let slots = generator().generate(date(), 30).unwrap();

        assert_eq!(slots.len(), 20);
        assert_eq!(slots[0].start_time, Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap());
        assert_eq!(slots[19].end_time(), Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap());
    }

    #[test]
    fn slots_are_strictly_increasing_with_fixed_step() {
        for duration in [10, 15, 25, 30, 45, 60, 90, 599, 600] {
            let slots = generator().generate(date(), duration).unwrap();
            for pair in slots.windows(2) {
                assert_eq!(pair[1].start_time - pair[0].start_time, Duration::minutes(duration));
            }
            assert!(slots.iter().all(|s| s.end_time() <= Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap()));
        }
        assert_eq!(generator().generate(date(), 600).unwrap().len(), 1);
        assert_eq!(generator().generate(date(), 599).unwrap().len(), 1);
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(generator().generate(date(), 45).unwrap(), generator().generate(date(), 45).unwrap());
    }

    #[test]
    fn closed_day_and_bad_duration() {
        let hours = ClinicHours {
            closed_days: vec![Weekday::Mon],
            ..ClinicHours::default()
        };
        let generator = SlotGenerator::new(hours);

        assert!(generator.generate(date(), 30).unwrap().is_empty());
        assert!(matches!(generator.generate(date(), 0), Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn request_validation() {
        let g = SlotGenerator::new(ClinicHours {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ..ClinicHours::default()
        });
        let now = Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap();
        let at = |h, m| Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap();

        assert!(g.validate_request(at(9, 0), 30, now).is_ok());
        assert!(g.validate_request(at(17, 30), 30, now).is_ok());
        assert!(matches!(g.validate_request(at(17, 45), 30, now), Err(SchedulingError::InvalidSlot(_))));
        assert!(matches!(g.validate_request(at(7, 30), 30, now), Err(SchedulingError::InvalidSlot(_))));
        assert!(matches!(g.validate_request(now, 30, now), Err(SchedulingError::InvalidSlot(_))));
        assert!(matches!(g.validate_request(at(9, 0), 0, now), Err(SchedulingError::InvalidSlot(_))));
        assert!(matches!(g.validate_request(at(9, 0), -30, now), Err(SchedulingError::InvalidSlot(_))));
    }

    #[test]
    fn oversized_durations_are_rejected_without_overflow() {
        let g = generator();
        let now = Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

        for duration in [601, 1_000_000_000_000, i64::MAX] {
            assert!(matches!(g.generate(date(), duration), Err(SchedulingError::Validation(_))));
            assert!(matches!(g.validate_request(start, duration, now), Err(SchedulingError::InvalidSlot(_))));
        }
        assert!(matches!(
            g.validate_request(DateTime::<Utc>::MAX_UTC, 30, now),
            Err(SchedulingError::InvalidSlot(_))
        ));
    }
}
