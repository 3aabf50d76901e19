// src/store.rs

//! Persistence contracts for the booking and document workflows.
//! `db::booking_store` and `db::document_store` implement them on Postgres.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::booking::{BookingSlot, BookingView, NewBookingBatch};
use crate::document::{DocumentRecord, NewDocument};
use crate::error::ServiceError;

pub type StoreResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Room name, if the room exists.
    async fn room_name(&self, room_id: Uuid) -> StoreResult<Option<String>>;

    /// Patient "first last", if the patient exists.
    async fn patient_name(&self, patient_id: Uuid) -> StoreResult<Option<String>>;

    /// Occupied slots of a room on any of `dates`.
    async fn booked_slots(&self, room_id: Uuid, dates: &[NaiveDate]) -> StoreResult<Vec<BookingSlot>>;

    /// Bookings owned by `user_id` with `from <= date <= to`, ordered by date and hour.
    async fn list_for_user(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<BookingView>>;

    async fn find_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<Option<BookingView>>;

    /// Checks every slot of the batch against the room and inserts all of
    /// them, or none. Occupied slots fail with `BookingConflict`.
    async fn insert_batch(&self, batch: &NewBookingBatch) -> StoreResult<Vec<BookingView>>;

    /// Returns false when no booking with that id belongs to the user.
    async fn delete_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<bool>;

    /// Points an owned booking at another room and patient. Fails with
    /// `BookingConflict` when the slot is taken in the target room and with
    /// `BookingNotFound` when the booking is not the user's.
    async fn reassign_owned(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        room_id: Uuid,
        patient_id: Uuid,
    ) -> StoreResult<BookingView>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn active_name_exists(&self, owner_id: Uuid, file_name: &str) -> StoreResult<bool>;

    /// Fails with `DocumentExists` when an active document of the owner already has the name.
    async fn insert(&self, doc: &NewDocument) -> StoreResult<DocumentRecord>;

    async fn find_active(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>>;

    async fn find_deleted(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>>;

    /// Active documents, or the trash when `deleted` is set. Newest first.
    async fn list(&self, owner_id: Uuid, patient_id: Option<Uuid>, deleted: bool) -> StoreResult<Vec<DocumentRecord>>;

    async fn mark_deleted(&self, document_id: Uuid, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord>;

    /// Fails with `DocumentExists` when the name was taken while `doc` sat in the trash.
    async fn mark_restored(&self, doc: &DocumentRecord, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord>;

    /// Every document, of any owner, deleted before `cutoff`.
    async fn deleted_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<DocumentRecord>>;

    /// Removes the `(document_id, storage_path)` rows that are still in the
    /// trash at that exact path; returns how many went away. A row restored
    /// or moved since it was read is left alone.
    async fn remove(&self, purged: &[(Uuid, String)]) -> StoreResult<u64>;
}
