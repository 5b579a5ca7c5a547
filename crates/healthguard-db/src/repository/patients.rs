//! # Patient Repository
//!
//! The node stores a single patient profile. The collection loop calls
//! [`PatientRepository::ensure_default`] before its first reading so every
//! vital record has a patient to point at.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::db_timestamp;
use crate::error::{DbError, DbResult};
use healthguard_core::{NewPatient, Patient, PatientUpdate};

#[derive(Debug, FromRow)]
struct PatientRow {
    id: i64,
    uuid: String,
    first_name: String,
    last_name: String,
    date_of_birth: Option<String>,
    medical_id: Option<String>,
    blood_type: Option<String>,
    emergency_contact: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            id: row.id,
            uuid: row.uuid,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            medical_id: row.medical_id,
            blood_type: row.blood_type,
            emergency_contact: row.emergency_contact,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PATIENT_COLUMNS: &str = "id, uuid, first_name, last_name, date_of_birth, medical_id, \
     blood_type, emergency_contact, notes, created_at, updated_at";

/// Repository for the patient profile.
#[derive(Debug, Clone)]
pub struct PatientRepository {
    pool: SqlitePool,
}

impl PatientRepository {
    /// Creates a new PatientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PatientRepository { pool }
    }

    /// Returns the node's patient (the oldest profile), if any.
    pub async fn get(&self) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY id ASC LIMIT 1");
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Patient::from))
    }

    /// Inserts a new patient profile.
    pub async fn create(&self, patient: &NewPatient) -> DbResult<Patient> {
        let now = db_timestamp(&Utc::now());
        let uuid = Uuid::new_v4().to_string();

        let sql = format!(
            "INSERT INTO patients (uuid, first_name, last_name, date_of_birth, medical_id, \
             blood_type, emergency_contact, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             RETURNING {PATIENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(&uuid)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(&patient.date_of_birth)
            .bind(&patient.medical_id)
            .bind(&patient.blood_type)
            .bind(&patient.emergency_contact)
            .bind(&patient.notes)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        debug!(patient_id = row.id, uuid = %row.uuid, "Patient created");
        Ok(row.into())
    }

    /// Returns the existing patient or creates the default profile.
    pub async fn ensure_default(&self) -> DbResult<Patient> {
        if let Some(patient) = self.get().await? {
            return Ok(patient);
        }

        let patient = self.create(&NewPatient::default_profile()).await?;
        info!(
            patient_id = patient.id,
            medical_id = ?patient.medical_id,
            "Created default patient profile"
        );
        Ok(patient)
    }

    /// Applies a partial update to the patient profile.
    ///
    /// ## Errors
    /// `DbError::NotFound` when no profile exists yet.
    pub async fn update(&self, update: &PatientUpdate) -> DbResult<Patient> {
        let current = self
            .get()
            .await?
            .ok_or_else(|| DbError::not_found("Patient", "default"))?;

        let sql = format!(
            "UPDATE patients SET \
                first_name = COALESCE(?2, first_name), \
                last_name = COALESCE(?3, last_name), \
                date_of_birth = COALESCE(?4, date_of_birth), \
                medical_id = COALESCE(?5, medical_id), \
                blood_type = COALESCE(?6, blood_type), \
                emergency_contact = COALESCE(?7, emergency_contact), \
                notes = COALESCE(?8, notes), \
                updated_at = ?9 \
             WHERE id = ?1 \
             RETURNING {PATIENT_COLUMNS}"
        );

        let trimmed = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string());

        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(current.id)
            .bind(trimmed(&update.first_name))
            .bind(trimmed(&update.last_name))
            .bind(trimmed(&update.date_of_birth))
            .bind(trimmed(&update.medical_id))
            .bind(trimmed(&update.blood_type))
            .bind(&update.emergency_contact)
            .bind(&update.notes)
            .bind(db_timestamp(&Utc::now()))
            .fetch_one(&self.pool)
            .await?;

        debug!(patient_id = row.id, "Patient updated");
        Ok(row.into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
