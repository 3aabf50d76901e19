// src/booking.rs

//! Room booking rules: the daily hour window, free-hour computation and
//! conflict detection. Everything here is pure so the stores and the
//! workflows in `services::booking_service` share one definition.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;

/// First bookable hour of the day.
pub const FIRST_HOUR: i32 = 8;
/// Exclusive upper bound of the daily window.
pub const END_HOUR: i32 = 16;

/// A (date, hour) pair. Ordered by date, then hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingSlot {
    pub date: NaiveDate,
    pub hour: i32,
}

impl BookingSlot {
    pub fn new(date: NaiveDate, hour: i32) -> Self {
        Self { date, hour }
    }
}

impl fmt::Display for BookingSlot {
    // e.g. "2025-01-10 09"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

/// Booking as returned to clients, with room and patient names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub booking_id: Uuid,
    pub date: NaiveDate,
    pub hour: i32,
    pub room_id: Uuid,
    pub room_name: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub user_id: Uuid,
}

impl BookingView {
    pub fn slot(&self) -> BookingSlot {
        BookingSlot::new(self.date, self.hour)
    }
}

/// Everything needed to insert one batch of bookings.
#[derive(Debug, Clone)]
pub struct NewBookingBatch {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub patient_id: Uuid,
    pub slots: Vec<BookingSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub hours: Vec<i32>,
}

pub fn is_bookable_hour(hour: i32) -> bool {
    (FIRST_HOUR..END_HOUR).contains(&hour)
}

/// Hours of the daily window not present in `booked`, ascending.
pub fn free_hours<I>(booked: I) -> Vec<i32>
where
    I: IntoIterator<Item = i32>,
{
    let taken: HashSet<i32> = booked.into_iter().collect();
    (FIRST_HOUR..END_HOUR).filter(|h| !taken.contains(h)).collect()
}

/// One entry per distinct requested date, in request order.
///
/// `booked` may contain slots for other dates; they are ignored.
pub fn availability(dates: &[NaiveDate], booked: &[BookingSlot]) -> Vec<DayAvailability> {
    let mut seen = HashSet::new();
    dates
        .iter()
        .copied()
        .filter(|d| seen.insert(*d))
        .map(|date| DayAvailability {
            date,
            hours: free_hours(booked.iter().filter(|s| s.date == date).map(|s| s.hour)),
        })
        .collect()
}

/// Slots requested more than once in the same batch, each reported once.
pub fn duplicate_slots(requested: &[BookingSlot]) -> Vec<BookingSlot> {
    let mut seen = HashSet::new();
    let dups: BTreeSet<BookingSlot> = requested
        .iter()
        .copied()
        .filter(|s| !seen.insert(*s))
        .collect();
    dups.into_iter().collect()
}

/// Requested slots that are already occupied, sorted and deduplicated.
pub fn conflicting_slots(requested: &[BookingSlot], occupied: &[BookingSlot]) -> Vec<BookingSlot> {
    let occupied: HashSet<&BookingSlot> = occupied.iter().collect();
    let hits: BTreeSet<BookingSlot> = requested
        .iter()
        .filter(|s| occupied.contains(s))
        .copied()
        .collect();
    hits.into_iter().collect()
}

/// Shape checks that need no database: non-empty, hours in the window,
/// no slot requested twice.
pub fn validate_request(slots: &[BookingSlot]) -> Result<(), ServiceError> {
    if slots.is_empty() {
        return Err(ServiceError::Validation(
            "at least one booking is required".into(),
        ));
    }

    if let Some(bad) = slots.iter().find(|s| !is_bookable_hour(s.hour)) {
        return Err(ServiceError::Validation(format!(
            "hour {} is outside {FIRST_HOUR}..{END_HOUR}",
            bad.hour
        )));
    }

    let dups = duplicate_slots(slots);
    if !dups.is_empty() {
        return Err(ServiceError::BookingConflict(dups));
    }
    Ok(())
}

pub fn format_slots(slots: &[BookingSlot]) -> String {
    slots
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn free_hours_excludes_booked() {
        assert_eq!(free_hours([9]), vec![8, 10, 11, 12, 13, 14, 15]);
        assert_eq!(free_hours(Vec::new()), vec![8, 9, 10, 11, 12, 13, 14, 15]);
        assert!(free_hours(FIRST_HOUR..END_HOUR).is_empty());
    }

    #[test]
    fn availability_one_entry_per_date() {
        let jan10 = d(2025, 1, 10);
        let jan11 = d(2025, 1, 11);
        let booked = vec![BookingSlot::new(jan10, 9), BookingSlot::new(d(2025, 1, 12), 8)];

        let out = availability(&[jan10, jan11, jan10], &booked);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, jan10);
        assert_eq!(out[0].hours, vec![8, 10, 11, 12, 13, 14, 15]);
        assert_eq!(out[1].date, jan11);
        assert_eq!(out[1].hours.len(), 8);
    }

    #[test]
    fn slot_display_is_zero_padded() {
        assert_eq!(BookingSlot::new(d(2025, 1, 10), 9).to_string(), "2025-01-10 09");
        assert_eq!(BookingSlot::new(d(2025, 1, 10), 14).to_string(), "2025-01-10 14");
    }

    #[test]
    fn bookable_hour_bounds() {
        assert!(!is_bookable_hour(7));
        assert!(is_bookable_hour(8));
        assert!(is_bookable_hour(15));
        assert!(!is_bookable_hour(16));
    }

    #[test]
    fn conflicts_are_sorted_and_unique() {
        let a = BookingSlot::new(d(2025, 1, 10), 9);
        let b = BookingSlot::new(d(2025, 1, 9), 12);
        let c = BookingSlot::new(d(2025, 1, 10), 10);
        assert_eq!(conflicting_slots(&[a, c, b], &[a, b]), vec![b, a]);
        assert!(conflicting_slots(&[c], &[a, b]).is_empty());
    }

    #[test]
    fn validate_rejects_empty_out_of_window_and_duplicates() {
        let day = d(2025, 1, 10);
        assert!(matches!(validate_request(&[]), Err(ServiceError::Validation(_))));
        assert!(matches!(
            validate_request(&[BookingSlot::new(day, 16)]),
            Err(ServiceError::Validation(_))
        ));
        match validate_request(&[BookingSlot::new(day, 9), BookingSlot::new(day, 9)]) {
            Err(ServiceError::BookingConflict(slots)) => {
                assert_eq!(slots, vec![BookingSlot::new(day, 9)])
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(validate_request(&[BookingSlot::new(day, 8), BookingSlot::new(day, 15)]).is_ok());
    }

    #[test]
    fn format_slots_joins() {
        let day = d(2025, 1, 10);
        assert_eq!(
            format_slots(&[BookingSlot::new(day, 9), BookingSlot::new(day, 10)]),
            "2025-01-10 09, 2025-01-10 10"
        );
    }
}
