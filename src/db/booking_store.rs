// src/db/booking_store.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking::{BookingSlot, BookingView, NewBookingBatch, conflicting_slots};
use crate::db::is_unique_violation;
use crate::error::ServiceError;
use crate::store::{BookingStore, StoreResult};

const BOOKING_VIEW_SELECT: &str = r#"
    SELECT
      b.booking_id,
      b.booking_date AS date,
      b.hour,
      b.room_id,
      r.name AS room_name,
      b.patient_id,
      p.first_name || ' ' || p.last_name AS patient_name,
      b.user_id
    FROM booking b
    JOIN room r ON r.room_id = b.room_id
    JOIN patient p ON p.patient_id = b.patient_id
"#;

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn conflict_on_unique(slot: BookingSlot) -> impl FnOnce(sqlx::Error) -> ServiceError {
    move |e| {
        if is_unique_violation(&e) {
            ServiceError::BookingConflict(vec![slot])
        } else {
            ServiceError::Database(e)
        }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn room_name(&self, room_id: Uuid) -> StoreResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(r#"SELECT name FROM room WHERE room_id = $1"#)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn patient_name(&self, patient_id: Uuid) -> StoreResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(
            r#"
            SELECT first_name || ' ' || last_name
            FROM patient
            WHERE patient_id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }

    async fn booked_slots(&self, room_id: Uuid, dates: &[NaiveDate]) -> StoreResult<Vec<BookingSlot>> {
        let rows: Vec<(NaiveDate, i32)> = sqlx::query_as(
            r#"
            SELECT booking_date, hour
            FROM booking
            WHERE room_id = $1
              AND booking_date = ANY($2)
            "#,
        )
        .bind(room_id)
        .bind(dates)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, hour)| BookingSlot::new(date, hour))
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<BookingView>> {
        let sql = format!(
            "{BOOKING_VIEW_SELECT}
            WHERE b.user_id = $1
              AND b.booking_date >= $2
              AND b.booking_date <= $3
            ORDER BY b.booking_date ASC, b.hour ASC"
        );
        let rows = sqlx::query_as::<_, BookingView>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<Option<BookingView>> {
        let sql = format!("{BOOKING_VIEW_SELECT} WHERE b.booking_id = $1 AND b.user_id = $2");
        let row = sqlx::query_as::<_, BookingView>(&sql)
            .bind(booking_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_batch(&self, batch: &NewBookingBatch) -> StoreResult<Vec<BookingView>> {
        let mut tx = self.pool.begin().await?;

        let dates: Vec<NaiveDate> = batch.slots.iter().map(|s| s.date).collect();
        let hours: Vec<i32> = batch.slots.iter().map(|s| s.hour).collect();

        // Rows locked here stay locked until commit; slots nobody holds yet
        // are covered by booking_slot_unique.
        let occupied: Vec<(NaiveDate, i32)> = sqlx::query_as(
            r#"
            SELECT b.booking_date, b.hour
            FROM booking b
            JOIN UNNEST($2::date[], $3::int4[]) AS req(d, h)
              ON b.booking_date = req.d AND b.hour = req.h
            WHERE b.room_id = $1
            FOR UPDATE OF b
            "#,
        )
        .bind(batch.room_id)
        .bind(&dates)
        .bind(&hours)
        .fetch_all(&mut *tx)
        .await?;

        let occupied: Vec<BookingSlot> = occupied
            .into_iter()
            .map(|(date, hour)| BookingSlot::new(date, hour))
            .collect();
        let conflicts = conflicting_slots(&batch.slots, &occupied);
        if !conflicts.is_empty() {
            return Err(ServiceError::BookingConflict(conflicts));
        }

        let mut ids = Vec::with_capacity(batch.slots.len());
        for slot in &batch.slots {
            let id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO booking (booking_date, hour, room_id, patient_id, user_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING booking_id
                "#,
            )
            .bind(slot.date)
            .bind(slot.hour)
            .bind(batch.room_id)
            .bind(batch.patient_id)
            .bind(batch.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(conflict_on_unique(*slot))?;
            ids.push(id);
        }

        let sql = format!(
            "{BOOKING_VIEW_SELECT}
            WHERE b.booking_id = ANY($1)
            ORDER BY b.booking_date ASC, b.hour ASC"
        );
        let created = sqlx::query_as::<_, BookingView>(&sql)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_owned(&self, user_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM booking
            WHERE booking_id = $1
              AND user_id = $2
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reassign_owned(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        room_id: Uuid,
        patient_id: Uuid,
    ) -> StoreResult<BookingView> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(NaiveDate, i32, Uuid)> = sqlx::query_as(
            r#"
            SELECT booking_date, hour, room_id
            FROM booking
            WHERE booking_id = $1
              AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((date, hour, current_room)) = current else {
            return Err(ServiceError::BookingNotFound);
        };
        let slot = BookingSlot::new(date, hour);

        if current_room != room_id {
            let taken: Option<Uuid> = sqlx::query_scalar(
                r#"
                SELECT booking_id
                FROM booking
                WHERE room_id = $1
                  AND booking_date = $2
                  AND hour = $3
                  AND booking_id <> $4
                "#,
            )
            .bind(room_id)
            .bind(date)
            .bind(hour)
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;

            if taken.is_some() {
                return Err(ServiceError::BookingConflict(vec![slot]));
            }
        }

        sqlx::query(
            r#"
            UPDATE booking
            SET room_id = $1,
                patient_id = $2
            WHERE booking_id = $3
            "#,
        )
        .bind(room_id)
        .bind(patient_id)
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique(slot))?;

        let sql = format!("{BOOKING_VIEW_SELECT} WHERE b.booking_id = $1");
        let view = sqlx::query_as::<_, BookingView>(&sql)
            .bind(booking_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(view)
    }
}
