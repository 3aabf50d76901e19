// src/services/booking_service.rs

use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking::{
    BookingSlot, BookingView, DayAvailability, NewBookingBatch, availability, format_slots,
    validate_request,
};
use crate::error::ServiceError;
use crate::store::BookingStore;

/// Longest range the calendar views may ask for.
const MAX_RANGE_DAYS: i64 = 62;

#[derive(Debug, Clone)]
pub struct CreateBookings {
    pub room_id: Uuid,
    pub patient_id: Uuid,
    pub slots: Vec<BookingSlot>,
}

/// Free hours per requested date. An unknown room is not an error: it has
/// no bookings, so every hour comes back free.
pub async fn free_hours(
    store: &dyn BookingStore,
    room_id: Uuid,
    dates: &[NaiveDate],
) -> Result<Vec<DayAvailability>, ServiceError> {
    if dates.is_empty() {
        return Ok(Vec::new());
    }
    let booked = store.booked_slots(room_id, dates).await?;
    Ok(availability(dates, &booked))
}

/// Day view when `end_date` is absent, inclusive range otherwise.
pub async fn list_bookings(
    store: &dyn BookingStore,
    user_id: Uuid,
    date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<Vec<BookingView>, ServiceError> {
    let end = end_date.unwrap_or(date);
    if end < date {
        return Err(ServiceError::Validation(
            "endDate must not be before date".into(),
        ));
    }
    if (end - date).num_days() > MAX_RANGE_DAYS {
        return Err(ServiceError::Validation(format!(
            "range must not exceed {MAX_RANGE_DAYS} days"
        )));
    }
    store.list_for_user(user_id, date, end).await
}

pub async fn get_booking(
    store: &dyn BookingStore,
    user_id: Uuid,
    booking_id: Uuid,
) -> Result<BookingView, ServiceError> {
    store
        .find_owned(user_id, booking_id)
        .await?
        .ok_or(ServiceError::BookingNotFound)
}

pub async fn create_bookings(
    store: &dyn BookingStore,
    user_id: Uuid,
    req: CreateBookings,
) -> Result<Vec<BookingView>, ServiceError> {
    validate_request(&req.slots)?;

    if store.room_name(req.room_id).await?.is_none() {
        return Err(ServiceError::RoomNotFound);
    }
    if store.patient_name(req.patient_id).await?.is_none() {
        return Err(ServiceError::PatientNotFound);
    }

    let batch = NewBookingBatch {
        user_id,
        room_id: req.room_id,
        patient_id: req.patient_id,
        slots: req.slots,
    };

    match store.insert_batch(&batch).await {
        Ok(created) => {
            tracing::info!(
                user_id = %user_id,
                room_id = %batch.room_id,
                count = created.len(),
                "bookings created"
            );
            let slots: Vec<BookingSlot> = created.iter().map(BookingView::slot).collect();
            tracing::debug!(slots = %format_slots(&slots), "booked slots");
            Ok(created)
        }
        Err(ServiceError::BookingConflict(slots)) => {
            tracing::info!(room_id = %batch.room_id, conflicts = slots.len(), "booking conflict");
            Err(ServiceError::BookingConflict(slots))
        }
        Err(e) => Err(e),
    }
}

pub async fn delete_booking(
    store: &dyn BookingStore,
    user_id: Uuid,
    booking_id: Uuid,
) -> Result<(), ServiceError> {
    if !store.delete_owned(user_id, booking_id).await? {
        return Err(ServiceError::BookingNotFound);
    }
    tracing::info!(user_id = %user_id, booking_id = %booking_id, "booking deleted");
    Ok(())
}

/// Moves an owned booking to another room and/or patient. The slot is
/// checked again in the target room.
pub async fn edit_booking(
    store: &dyn BookingStore,
    user_id: Uuid,
    booking_id: Uuid,
    room_id: Uuid,
    patient_id: Uuid,
) -> Result<BookingView, ServiceError> {
    if store.find_owned(user_id, booking_id).await?.is_none() {
        return Err(ServiceError::BookingNotFound);
    }
    if store.room_name(room_id).await?.is_none() {
        return Err(ServiceError::RoomNotFound);
    }
    if store.patient_name(patient_id).await?.is_none() {
        return Err(ServiceError::PatientNotFound);
    }
    store
        .reassign_owned(user_id, booking_id, room_id, patient_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryStore;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    struct Fixture {
        store: MemoryStore,
        user: Uuid,
        room_a: Uuid,
        room_b: Uuid,
        patient: Uuid,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::default();
        let room_a = store.add_room("A");
        let room_b = store.add_room("B");
        let patient = store.add_patient("Jane Doe");
        Fixture {
            store,
            user: Uuid::new_v4(),
            room_a,
            room_b,
            patient,
        }
    }

    fn request(f: &Fixture, room: Uuid, slots: &[(u32, i32)]) -> CreateBookings {
        CreateBookings {
            room_id: room,
            patient_id: f.patient,
            slots: slots.iter().map(|(d, h)| BookingSlot::new(jan(*d), *h)).collect(),
        }
    }

    #[tokio::test]
    async fn booked_hour_disappears_from_free_hours() {
        let f = fixture();
        let created = create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].room_name, "A");
        assert_eq!(created[0].patient_name, "Jane Doe");

        let free = free_hours(&f.store, f.room_a, &[jan(10)]).await.unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].hours, vec![8, 10, 11, 12, 13, 14, 15]);

        // other rooms are unaffected
        let free_b = free_hours(&f.store, f.room_b, &[jan(10)]).await.unwrap();
        assert_eq!(free_b[0].hours.len(), 8);
    }

    #[tokio::test]
    async fn unknown_room_reports_every_hour_free() {
        let f = fixture();
        let free = free_hours(&f.store, Uuid::new_v4(), &[jan(10), jan(11)])
            .await
            .unwrap();
        assert_eq!(free.len(), 2);
        assert!(free.iter().all(|d| d.hours == vec![8, 9, 10, 11, 12, 13, 14, 15]));
    }

    #[tokio::test]
    async fn conflict_names_slot_and_inserts_nothing() {
        let f = fixture();
        create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();

        let err = create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 8), (10, 9)]))
            .await
            .unwrap_err();
        match err {
            ServiceError::BookingConflict(slots) => {
                assert_eq!(slots, vec![BookingSlot::new(jan(10), 9)]);
                assert_eq!(slots[0].to_string(), "2025-01-10 09");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(f.store.booking_count(), 1);
    }

    #[tokio::test]
    async fn same_slot_in_another_room_is_allowed() {
        let f = fixture();
        create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();
        create_bookings(&f.store, f.user, request(&f, f.room_b, &[(10, 9)]))
            .await
            .unwrap();
        assert_eq!(f.store.booking_count(), 2);
    }

    #[tokio::test]
    async fn missing_room_or_patient_is_not_found() {
        let f = fixture();
        let err = create_bookings(&f.store, f.user, request(&f, Uuid::new_v4(), &[(10, 9)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound));

        let mut req = request(&f, f.room_a, &[(10, 9)]);
        req.patient_id = Uuid::new_v4();
        let err = create_bookings(&f.store, f.user, req).await.unwrap_err();
        assert!(matches!(err, ServiceError::PatientNotFound));
        assert_eq!(f.store.booking_count(), 0);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner_and_frees_slot() {
        let f = fixture();
        let created = create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();
        let id = created[0].booking_id;

        let stranger = Uuid::new_v4();
        let err = delete_booking(&f.store, stranger, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::BookingNotFound));

        delete_booking(&f.store, f.user, id).await.unwrap();
        let free = free_hours(&f.store, f.room_a, &[jan(10)]).await.unwrap();
        assert_eq!(free[0].hours.len(), 8);

        let err = delete_booking(&f.store, f.user, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::BookingNotFound));
    }

    #[tokio::test]
    async fn edit_rechecks_slot_in_target_room() {
        let f = fixture();
        let mine = create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();
        create_bookings(&f.store, Uuid::new_v4(), request(&f, f.room_b, &[(10, 9)]))
            .await
            .unwrap();

        let err = edit_booking(&f.store, f.user, mine[0].booking_id, f.room_b, f.patient)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BookingConflict(_)));

        let other_patient = f.store.add_patient("John Roe");
        let edited = edit_booking(&f.store, f.user, mine[0].booking_id, f.room_a, other_patient)
            .await
            .unwrap();
        assert_eq!(edited.patient_name, "John Roe");
        assert_eq!(edited.room_id, f.room_a);

        let err = edit_booking(&f.store, Uuid::new_v4(), mine[0].booking_id, f.room_a, f.patient)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BookingNotFound));
    }

    #[tokio::test]
    async fn list_day_and_range_views() {
        let f = fixture();
        create_bookings(
            &f.store,
            f.user,
            request(&f, f.room_a, &[(10, 9), (12, 8), (20, 11)]),
        )
        .await
        .unwrap();
        create_bookings(&f.store, Uuid::new_v4(), request(&f, f.room_b, &[(10, 10)]))
            .await
            .unwrap();

        let day = list_bookings(&f.store, f.user, jan(10), None).await.unwrap();
        assert_eq!(day.len(), 1);

        let week = list_bookings(&f.store, f.user, jan(10), Some(jan(16))).await.unwrap();
        assert_eq!(week.iter().map(|b| b.date).collect::<Vec<_>>(), vec![jan(10), jan(12)]);

        let err = list_bookings(&f.store, f.user, jan(16), Some(jan(10))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn get_booking_is_scoped_to_owner() {
        let f = fixture();
        let created = create_bookings(&f.store, f.user, request(&f, f.room_a, &[(10, 9)]))
            .await
            .unwrap();
        let id = created[0].booking_id;
        assert_eq!(get_booking(&f.store, f.user, id).await.unwrap().hour, 9);
        assert!(matches!(
            get_booking(&f.store, Uuid::new_v4(), id).await,
            Err(ServiceError::BookingNotFound)
        ));
    }
}
