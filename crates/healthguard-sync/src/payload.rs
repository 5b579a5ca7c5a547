//! # Batch Payload and Signing
//!
//! ## Wire Format
//! ```text
//! POST {central_server_url}/sync/upload
//! Content-Type:  application/json
//! X-Device-ID:   edge-node-001
//! X-Signature:   hex(HMAC-SHA256(api_key, body))
//! Authorization: Bearer {api_key}
//!
//! {
//!   "device_id": "edge-node-001",
//!   "batch_timestamp": "2026-01-01T00:00:00.000000Z",
//!   "readings": [
//!     { "uuid": "…", "timestamp": "…", "heart_rate": 72.4, "spo2": 97.9,
//!       "temperature": 36.6, "blood_pressure_sys": 121.0,
//!       "blood_pressure_dia": 78.2, "respiratory_rate": 15.8 }
//!   ]
//! }
//! ```
//!
//! The body is serialized once and the signature covers those exact bytes.
//! Sync-state fields and the raw waveform are never sent.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use healthguard_core::VitalRecord;

use crate::error::{SyncError, SyncResult};

type HmacSha256 = Hmac<Sha256>;

/// One reading as the central server receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPayload {
    pub uuid: String,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub temperature: Option<f64>,
    pub blood_pressure_sys: Option<f64>,
    pub blood_pressure_dia: Option<f64>,
    pub respiratory_rate: Option<f64>,
}

impl From<&VitalRecord> for ReadingPayload {
    fn from(record: &VitalRecord) -> Self {
        ReadingPayload {
            uuid: record.uuid.clone(),
            timestamp: record.timestamp,
            heart_rate: record.heart_rate,
            spo2: record.spo2,
            temperature: record.temperature,
            blood_pressure_sys: record.blood_pressure_sys,
            blood_pressure_dia: record.blood_pressure_dia,
            respiratory_rate: record.respiratory_rate,
        }
    }
}

/// Batch body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub device_id: String,
    pub batch_timestamp: DateTime<Utc>,
    pub readings: Vec<ReadingPayload>,
}

impl SyncPayload {
    /// Builds a batch of `records`, stamped now.
    pub fn new(device_id: &str, records: &[VitalRecord]) -> Self {
        SyncPayload {
            device_id: device_id.to_string(),
            batch_timestamp: Utc::now(),
            readings: records.iter().map(ReadingPayload::from).collect(),
        }
    }

    /// Serializes the batch and signs the resulting bytes with `key`.
    pub fn sign(&self, key: &[u8]) -> SyncResult<SignedBatch> {
        let body = serde_json::to_vec(self)?;
        let signature = sign(key, &body)?;
        Ok(SignedBatch {
            body,
            signature,
            record_count: self.readings.len(),
        })
    }
}

/// A serialized batch and its signature, ready to send (and resend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBatch {
    pub body: Vec<u8>,
    /// Lowercase hex HMAC-SHA256 of `body`.
    pub signature: String,
    pub record_count: usize,
}

/// Hex HMAC-SHA256 of `body` under `key`.
pub fn sign(key: &[u8], body: &[u8]) -> SyncResult<String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SyncError::SigningFailed(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex signature in constant time. Used by receivers of batches.
pub fn verify(key: &[u8], body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, heart_rate: f64) -> VitalRecord {
        VitalRecord {
            id,
            uuid: format!("00000000-0000-4000-8000-{id:012}"),
            patient_id: 1,
            timestamp: Utc::now(),
            heart_rate: Some(heart_rate),
            spo2: Some(97.5),
            temperature: None,
            blood_pressure_sys: None,
            blood_pressure_dia: None,
            respiratory_rate: None,
            ppg_raw: Some(vec![0.1, 0.2]),
            synced: false,
            synced_at: None,
        }
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2.
        let signature = sign(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_covers_exact_body() {
        let payload = SyncPayload::new("edge-node-001", &[record(1, 72.0), record(2, 74.5)]);
        let batch = payload.sign(b"change-me").unwrap();

        assert_eq!(batch.record_count, 2);
        assert_eq!(batch.signature.len(), 64);
        assert!(verify(b"change-me", &batch.body, &batch.signature));
        assert!(!verify(b"other-key", &batch.body, &batch.signature));

        let mut tampered = batch.body.clone();
        tampered.push(b' ');
        assert!(!verify(b"change-me", &tampered, &batch.signature));
        assert!(!verify(b"change-me", &batch.body, "not-hex"));
    }

    #[test]
    fn test_body_omits_sync_state_and_waveform() {
        let payload = SyncPayload::new("edge-node-001", &[record(1, 72.0)]);
        let batch = payload.sign(b"k").unwrap();

        let json: serde_json::Value = serde_json::from_slice(&batch.body).unwrap();
        assert_eq!(json["device_id"], "edge-node-001");
        let reading = &json["readings"][0];
        assert_eq!(reading["heart_rate"], 72.0);
        assert!(reading["temperature"].is_null());
        assert!(reading.get("synced").is_none());
        assert!(reading.get("ppg_raw").is_none());
        assert!(reading.get("id").is_none());

        let decoded: SyncPayload = serde_json::from_slice(&batch.body).unwrap();
        assert_eq!(decoded, payload);
    }
}
