// src/routes/patient_routes.rs

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Role},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

/* =========================
   Rows / DTOs
========================= */

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub coordinator_user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<chrono::NaiveDate>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactRow {
    pub contact_id: Uuid,
    #[serde(skip)]
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub relationship: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: PatientRow,
    pub contacts: Vec<ContactRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub first_name: String,
    pub last_name: String,
    pub relationship: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Body of create and update. Update replaces every field and the contacts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<chrono::NaiveDate>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub contacts: Vec<ContactInput>,
}

const PATIENT_COLUMNS: &str = "patient_id, coordinator_user_id, first_name, last_name, birthday, \
     street, city, postal_code, country, email, phone, created_at, updated_at";

/* =========================
   Validation
========================= */

/// Empty or whitespace-only optional text becomes NULL.
fn clean(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(field: &str, v: &str) -> Result<String, ApiError> {
    let t = v.trim();
    if t.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        ));
    }
    Ok(t.to_string())
}

#[derive(Debug)]
struct CleanContact {
    first_name: String,
    last_name: String,
    relationship: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug)]
struct CleanPatient {
    first_name: String,
    last_name: String,
    birthday: Option<chrono::NaiveDate>,
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    contacts: Vec<CleanContact>,
}

fn validate_patient(req: &PatientInput) -> Result<CleanPatient, ApiError> {
    let first_name = required("firstName", &req.first_name)?;
    let last_name = required("lastName", &req.last_name)?;

    if let Some(b) = req.birthday {
        if b > chrono::Utc::now().date_naive() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "birthday cannot be in the future".into(),
            ));
        }
    }

    let contacts = req
        .contacts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Ok(CleanContact {
                first_name: required(&format!("contacts[{i}].firstName"), &c.first_name)?,
                last_name: required(&format!("contacts[{i}].lastName"), &c.last_name)?,
                relationship: clean(&c.relationship),
                email: clean(&c.email),
                phone: clean(&c.phone),
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(CleanPatient {
        first_name,
        last_name,
        birthday: req.birthday,
        street: clean(&req.street),
        city: clean(&req.city),
        postal_code: clean(&req.postal_code),
        country: clean(&req.country),
        email: clean(&req.email),
        phone: clean(&req.phone),
        contacts,
    })
}

fn patient_not_found() -> ApiError {
    ApiError::NotFound("PATIENT_NOT_FOUND", "patient not found".into())
}

/* =========================
   Helpers
========================= */

async fn load_contacts(
    db: &sqlx::PgPool,
    patient_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<ContactRow>>, ApiError> {
    let rows: Vec<ContactRow> = sqlx::query_as::<_, ContactRow>(
        r#"
        SELECT contact_id, patient_id, first_name, last_name, relationship, email, phone
        FROM patient_contact
        WHERE patient_id = ANY($1)
        ORDER BY last_name, first_name
        "#,
    )
    .bind(patient_ids)
    .fetch_all(db)
    .await
    .map_err(ApiError::db)?;

    let mut by_patient: HashMap<Uuid, Vec<ContactRow>> = HashMap::new();
    for c in rows {
        by_patient.entry(c.patient_id).or_default().push(c);
    }
    Ok(by_patient)
}

/// Admins see every patient, coordinators only their own.
async fn find_visible(
    db: &sqlx::PgPool,
    auth: &AuthContext,
    patient_id: Uuid,
) -> Result<PatientRow, ApiError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patient \
         WHERE patient_id = $1 AND ($2 OR coordinator_user_id = $3)"
    );
    sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .bind(auth.role == Role::Admin)
        .bind(auth.user_id)
        .fetch_optional(db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(patient_not_found)
}

async fn insert_contacts(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    patient_id: Uuid,
    contacts: &[CleanContact],
) -> Result<(), ApiError> {
    for c in contacts {
        sqlx::query(
            r#"
            INSERT INTO patient_contact (patient_id, first_name, last_name, relationship, email, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(patient_id)
        .bind(&c.first_name)
        .bind(&c.last_name)
        .bind(c.relationship.as_deref())
        .bind(c.email.as_deref())
        .bind(c.phone.as_deref())
        .execute(&mut **tx)
        .await
        .map_err(ApiError::db)?;
    }
    Ok(())
}

async fn view_of(db: &sqlx::PgPool, patient: PatientRow) -> Result<PatientView, ApiError> {
    let mut contacts = load_contacts(db, &[patient.patient_id]).await?;
    let contacts = contacts.remove(&patient.patient_id).unwrap_or_default();
    Ok(PatientView { patient, contacts })
}

/* =========================
   Handlers
========================= */

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn list_patients(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientView>>>, ApiError> {
    let query = q.query.unwrap_or_default().trim().to_string();
    let like = format!("%{query}%");

    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patient \
         WHERE ($1 OR coordinator_user_id = $2) \
           AND ($3 = '' OR first_name ILIKE $4 OR last_name ILIKE $4) \
         ORDER BY last_name, first_name"
    );
    let rows: Vec<PatientRow> = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(auth.role == Role::Admin)
        .bind(auth.user_id)
        .bind(&query)
        .bind(&like)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    let ids: Vec<Uuid> = rows.iter().map(|p| p.patient_id).collect();
    let mut contacts = load_contacts(&state.db, &ids).await?;

    let patients = rows
        .into_iter()
        .map(|patient| {
            let contacts = contacts.remove(&patient.patient_id).unwrap_or_default();
            PatientView { patient, contacts }
        })
        .collect();

    Ok(Json(ApiOk::new(patients)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientView>>, ApiError> {
    let patient = find_visible(&state.db, &auth, patient_id).await?;
    Ok(Json(ApiOk::new(view_of(&state.db, patient).await?)))
}

/// The acting user becomes the coordinator.
pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PatientInput>,
) -> Result<(StatusCode, Json<ApiOk<PatientView>>), ApiError> {
    let p = validate_patient(&req)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let sql = format!(
        "INSERT INTO patient \
             (coordinator_user_id, first_name, last_name, birthday, street, city, postal_code, country, email, phone) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {PATIENT_COLUMNS}"
    );
    let patient: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(auth.user_id)
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.birthday)
        .bind(p.street.as_deref())
        .bind(p.city.as_deref())
        .bind(p.postal_code.as_deref())
        .bind(p.country.as_deref())
        .bind(p.email.as_deref())
        .bind(p.phone.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::db)?;

    insert_contacts(&mut tx, patient.patient_id, &p.contacts).await?;
    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(patient_id = %patient.patient_id, user_id = %auth.user_id, "patient created");
    let view = view_of(&state.db, patient).await?;
    Ok((StatusCode::CREATED, Json(ApiOk::new(view))))
}

pub async fn update_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<PatientInput>,
) -> Result<Json<ApiOk<PatientView>>, ApiError> {
    let p = validate_patient(&req)?;
    find_visible(&state.db, &auth, patient_id).await?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let sql = format!(
        "UPDATE patient \
         SET first_name = $1, last_name = $2, birthday = $3, street = $4, city = $5, \
             postal_code = $6, country = $7, email = $8, phone = $9, updated_at = now() \
         WHERE patient_id = $10 \
         RETURNING {PATIENT_COLUMNS}"
    );
    let patient: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.birthday)
        .bind(p.street.as_deref())
        .bind(p.city.as_deref())
        .bind(p.postal_code.as_deref())
        .bind(p.country.as_deref())
        .bind(p.email.as_deref())
        .bind(p.phone.as_deref())
        .bind(patient_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(patient_not_found)?;

    sqlx::query(
        r#"
        DELETE FROM patient_contact
        WHERE patient_id = $1
        "#,
    )
    .bind(patient_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    insert_contacts(&mut tx, patient_id, &p.contacts).await?;
    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk::new(view_of(&state.db, patient).await?)))
}

/// Contacts and bookings go with the patient; documents are kept unlinked.
pub async fn delete_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let res = sqlx::query(
        r#"
        DELETE FROM patient
        WHERE patient_id = $1
          AND ($2 OR coordinator_user_id = $3)
        "#,
    )
    .bind(patient_id)
    .bind(auth.role == Role::Admin)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(patient_not_found());
    }

    tracing::info!(patient_id = %patient_id, "patient deleted");
    Ok(StatusCode::NO_CONTENT)
}
