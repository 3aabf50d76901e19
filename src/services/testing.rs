// In-memory stores for workflow tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::booking::{BookingSlot, BookingView, NewBookingBatch, conflicting_slots};
use crate::document::{DocumentRecord, DocumentState, NewDocument};
use crate::error::ServiceError;
use crate::storage::{DocumentStorage, StorageError, original_name};
use crate::store::{BookingStore, DocumentStore, StoreResult};

#[derive(Default)]
struct MemoryState {
    rooms: HashMap<Uuid, String>,
    patients: HashMap<Uuid, String>,
    bookings: Vec<BookingView>,
    documents: Vec<DocumentRecord>,
}

/// Document writes that can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailingWrite {
    Insert,
    MarkDeleted,
    MarkRestored,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing: Mutex<HashSet<FailingWrite>>,
}

impl MemoryStore {
    pub fn add_room(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().rooms.insert(id, name.to_string());
        id
    }

    pub fn add_patient(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().patients.insert(id, name.to_string());
        id
    }

    pub fn booking_count(&self) -> usize {
        self.state.lock().unwrap().bookings.len()
    }

    pub fn document(&self, document_id: Uuid) -> Option<DocumentRecord> {
        self.state
            .lock()
            .unwrap()
            .documents
            .iter()
            .find(|d| d.document_id == document_id)
            .cloned()
    }

    /// The next `op` fails without touching any row.
    pub fn fail_write(&self, op: FailingWrite) {
        self.failing.lock().unwrap().insert(op);
    }

    fn take_failure(&self, op: FailingWrite) -> bool {
        self.failing.lock().unwrap().remove(&op)
    }

    fn view(state: &MemoryState, user_id: Uuid, room_id: Uuid, patient_id: Uuid, slot: BookingSlot) -> BookingView {
        BookingView {
            booking_id: Uuid::new_v4(),
            date: slot.date,
            hour: slot.hour,
            room_id,
            room_name: state.rooms.get(&room_id).cloned().unwrap_or_default(),
            patient_id,
            patient_name: state.patients.get(&patient_id).cloned().unwrap_or_default(),
            user_id,
        }
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn room_name(&self, room_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self.state.lock().unwrap().rooms.get(&room_id).cloned())
    }

    async fn patient_name(&self, patient_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self.state.lock().unwrap().patients.get(&patient_id).cloned())
    }

    async fn booked_slots(&self, room_id: Uuid, dates: &[NaiveDate]) -> StoreResult<Vec<BookingSlot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .filter(|b| b.room_id == room_id && dates.contains(&b.date))
            .map(BookingView::slot)
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<BookingView>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<BookingView> = state
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id && b.date >= from && b.date <= to)
            .cloned()
            .collect();
        out.sort_by_key(BookingView::slot);
        Ok(out)
    }

    async fn find_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<Option<BookingView>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .find(|b| b.booking_id == booking_id && b.user_id == user_id)
            .cloned())
    }

    async fn insert_batch(&self, batch: &NewBookingBatch) -> StoreResult<Vec<BookingView>> {
        let mut state = self.state.lock().unwrap();
        let occupied: Vec<BookingSlot> = state
            .bookings
            .iter()
            .filter(|b| b.room_id == batch.room_id)
            .map(BookingView::slot)
            .collect();
        let conflicts = conflicting_slots(&batch.slots, &occupied);
        if !conflicts.is_empty() {
            return Err(ServiceError::BookingConflict(conflicts));
        }

        let created: Vec<BookingView> = batch
            .slots
            .iter()
            .map(|s| Self::view(&state, batch.user_id, batch.room_id, batch.patient_id, *s))
            .collect();
        state.bookings.extend(created.iter().cloned());
        Ok(created)
    }

    async fn delete_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.bookings.len();
        state
            .bookings
            .retain(|b| !(b.booking_id == booking_id && b.user_id == user_id));
        Ok(state.bookings.len() < before)
    }

    async fn reassign_owned(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        room_id: Uuid,
        patient_id: Uuid,
    ) -> StoreResult<BookingView> {
        let mut state = self.state.lock().unwrap();
        let idx = state
            .bookings
            .iter()
            .position(|b| b.booking_id == booking_id && b.user_id == user_id)
            .ok_or(ServiceError::BookingNotFound)?;
        let slot = state.bookings[idx].slot();

        let taken = state
            .bookings
            .iter()
            .any(|b| b.booking_id != booking_id && b.room_id == room_id && b.slot() == slot);
        if taken {
            return Err(ServiceError::BookingConflict(vec![slot]));
        }

        let room_name = state.rooms.get(&room_id).cloned().unwrap_or_default();
        let patient_name = state.patients.get(&patient_id).cloned().unwrap_or_default();
        let b = &mut state.bookings[idx];
        b.room_id = room_id;
        b.room_name = room_name;
        b.patient_id = patient_id;
        b.patient_name = patient_name;
        Ok(b.clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn active_name_exists(&self, owner_id: Uuid, file_name: &str) -> StoreResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.documents.iter().any(|d| {
            d.owner_id == Some(owner_id) && d.file_name == file_name && d.state.is_active()
        }))
    }

    async fn insert(&self, doc: &NewDocument) -> StoreResult<DocumentRecord> {
        if self.take_failure(FailingWrite::Insert) {
            return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(pid) = doc.patient_id {
            if !state.patients.contains_key(&pid) {
                return Err(ServiceError::PatientNotFound);
            }
        }
        let clash = state.documents.iter().any(|d| {
            d.owner_id == Some(doc.owner_id) && d.file_name == doc.file_name && d.state.is_active()
        });
        if clash {
            return Err(ServiceError::DocumentExists(doc.file_name.clone()));
        }
        let record = DocumentRecord {
            document_id: Uuid::new_v4(),
            owner_id: Some(doc.owner_id),
            patient_id: doc.patient_id,
            file_name: doc.file_name.clone(),
            storage_path: doc.storage_path.clone(),
            state: DocumentState::Active,
            edited_at: doc.created_at,
            created_at: doc.created_at,
        };
        state.documents.push(record.clone());
        Ok(record)
    }

    async fn find_active(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.document(document_id).filter(|d| {
            d.owner_id == Some(owner_id) && d.state.is_active()
        }))
    }

    async fn find_deleted(&self, owner_id: Uuid, document_id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.document(document_id).filter(|d| {
            d.owner_id == Some(owner_id) && !d.state.is_active()
        }))
    }

    async fn list(&self, owner_id: Uuid, patient_id: Option<Uuid>, deleted: bool) -> StoreResult<Vec<DocumentRecord>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<DocumentRecord> = state
            .documents
            .iter()
            .filter(|d| d.owner_id == Some(owner_id))
            .filter(|d| patient_id.is_none() || d.patient_id == patient_id)
            .filter(|d| d.state.is_active() != deleted)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
        Ok(out)
    }

    async fn mark_deleted(&self, document_id: Uuid, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord> {
        if self.take_failure(FailingWrite::MarkDeleted) {
            return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.state.lock().unwrap();
        let d = state
            .documents
            .iter_mut()
            .find(|d| d.document_id == document_id && d.state.is_active())
            .ok_or(ServiceError::DocumentNotFound)?;
        d.state = DocumentState::Deleted { at };
        d.edited_at = at;
        d.storage_path = storage_path.to_string();
        Ok(d.clone())
    }

    async fn mark_restored(&self, doc: &DocumentRecord, storage_path: &str, at: DateTime<Utc>) -> StoreResult<DocumentRecord> {
        let injected = self.take_failure(FailingWrite::MarkRestored);
        let mut state = self.state.lock().unwrap();
        let clash = state.documents.iter().any(|d| {
            d.document_id != doc.document_id
                && d.owner_id == doc.owner_id
                && d.file_name == doc.file_name
                && d.state.is_active()
        });
        if clash || injected {
            return Err(ServiceError::DocumentExists(doc.file_name.clone()));
        }
        let d = state
            .documents
            .iter_mut()
            .find(|d| d.document_id == doc.document_id && !d.state.is_active())
            .ok_or(ServiceError::DocumentNotFound)?;
        d.state = DocumentState::Active;
        d.edited_at = at;
        d.storage_path = storage_path.to_string();
        Ok(d.clone())
    }

    async fn deleted_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<DocumentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter()
            .filter(|d| matches!(d.state, DocumentState::Deleted { at } if at < cutoff))
            .cloned()
            .collect())
    }

    async fn remove(&self, purged: &[(Uuid, String)]) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.documents.len();
        state.documents.retain(|d| {
            let gone = !d.state.is_active()
                && purged
                    .iter()
                    .any(|(id, path)| *id == d.document_id && *path == d.storage_path);
            !gone
        });
        Ok((before - state.documents.len()) as u64)
    }
}

/// File storage kept in a map. Paths listed in `failing` refuse to purge.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn fail_purge_of(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn forget(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    fn take(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .ok_or_else(|| StorageError::Missing(path.to_string()))
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn save(&self, owner_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = format!("{owner_id}/files/{}_{file_name}", Uuid::new_v4());
        self.files.lock().unwrap().insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::Missing(path.to_string()))
    }

    async fn soft_delete(&self, owner_id: Uuid, path: &str) -> Result<String, StorageError> {
        let file_name =
            original_name(path).ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let to = format!("{owner_id}/trash/{}_{file_name}", Uuid::new_v4());
        let bytes = self.take(path)?;
        self.files.lock().unwrap().insert(to.clone(), bytes);
        Ok(to)
    }

    async fn restore(&self, owner_id: Uuid, path: &str, file_name: &str) -> Result<String, StorageError> {
        let bytes = self.take(path)?;
        let to = format!("{owner_id}/files/{}_{file_name}", Uuid::new_v4());
        self.files.lock().unwrap().insert(to.clone(), bytes);
        Ok(to)
    }

    async fn relocate(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let bytes = self.take(from)?;
        self.files.lock().unwrap().insert(to.to_string(), bytes);
        Ok(())
    }

    async fn purge(&self, path: &str) -> Result<(), StorageError> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "purge refused",
            )));
        }
        self.take(path).map(|_| ())
    }
}
