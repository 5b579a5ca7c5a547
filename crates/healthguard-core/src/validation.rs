//! # Validation Module
//!
//! Input validation for the edge-node API.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractors (axum)                                       │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Lengths, ranges, formats                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── CHECK (synced ⇔ synced_at)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use healthguard_core::validation::{validate_page, validate_stats_hours};
//!
//! assert_eq!(validate_page(None, None).unwrap(), (1, 50));
//! assert!(validate_stats_hours(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::PatientUpdate;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_STATS_HOURS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Blood groups accepted on the patient profile.
pub const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

const NAME_MAX: usize = 100;
const FREE_TEXT_MAX: usize = 2000;

// =============================================================================
// Credentials
// =============================================================================

/// Validates a username.
///
/// ## Rules
/// - 3 to 50 characters after trimming
/// - Letters, digits, `.`, `_` and `-` only
///
/// ## Returns
/// The trimmed username.
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.chars().count() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(username.to_string())
}

/// Validates a new password (at least 4 characters, at most 128).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < 4 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 4,
        });
    }

    if password.chars().count() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Patient Profile
// =============================================================================

/// Validates a partial patient update.
///
/// Only fields that are present are checked. Names must not be blank,
/// `date_of_birth` must be an ISO date not in the future, `blood_type` one
/// of [`BLOOD_TYPES`].
pub fn validate_patient_update(update: &PatientUpdate) -> ValidationResult<()> {
    if let Some(first_name) = &update.first_name {
        validate_name("first_name", first_name)?;
    }
    if let Some(last_name) = &update.last_name {
        validate_name("last_name", last_name)?;
    }

    if let Some(dob) = &update.date_of_birth {
        validate_date_of_birth(dob)?;
    }

    if let Some(blood_type) = &update.blood_type {
        if !BLOOD_TYPES.contains(&blood_type.trim()) {
            return Err(ValidationError::NotAllowed {
                field: "blood_type".to_string(),
                allowed: BLOOD_TYPES.iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    if let Some(medical_id) = &update.medical_id {
        if medical_id.trim().chars().count() > 50 {
            return Err(ValidationError::TooLong {
                field: "medical_id".to_string(),
                max: 50,
            });
        }
    }

    if let Some(contact) = &update.emergency_contact {
        if contact.chars().count() > 200 {
            return Err(ValidationError::TooLong {
                field: "emergency_contact".to_string(),
                max: 200,
            });
        }
    }

    if let Some(notes) = &update.notes {
        if notes.chars().count() > FREE_TEXT_MAX {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: FREE_TEXT_MAX,
            });
        }
    }

    Ok(())
}

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > NAME_MAX {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: NAME_MAX,
        });
    }

    Ok(())
}

/// Validates an ISO `YYYY-MM-DD` date of birth.
pub fn validate_date_of_birth(value: &str) -> ValidationResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: "date_of_birth".to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        }
    })?;

    if date > chrono::Utc::now().date_naive() {
        return Err(ValidationError::InvalidFormat {
            field: "date_of_birth".to_string(),
            reason: "must not be in the future".to_string(),
        });
    }

    Ok(date)
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Applies defaults and bounds to listing parameters.
///
/// ## Returns
/// `(page, page_size)` with `page >= 1` and `1 <= page_size <= 500`.
pub fn validate_page(page: Option<u32>, page_size: Option<u32>) -> ValidationResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: i64::from(u32::MAX),
        });
    }

    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: i64::from(MAX_PAGE_SIZE),
        });
    }

    Ok((page, page_size))
}

/// Validates the statistics window (1 to 720 hours).
pub fn validate_stats_hours(hours: u32) -> ValidationResult<u32> {
    if !(1..=MAX_STATS_HOURS).contains(&hours) {
        return Err(ValidationError::OutOfRange {
            field: "hours".to_string(),
            min: 1,
            max: i64::from(MAX_STATS_HOURS),
        });
    }
    Ok(hours)
}

// =============================================================================
// Unit Tests
// =============================================================================
