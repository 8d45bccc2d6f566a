//! Record signatures for cache gating
//!
//! A signature is a deterministic fingerprint of the record fields that affect rendered
//! output. It is not cryptographic; exact string equality is the only contract.
//!
//! Signature = "sig1:" || hex(BLAKE3(canonical JSON projection))
//!
//! The projection is built from fixed structs, so field order never depends on the
//! record representation. Requirement and file sequences are projected in their
//! existing order: reordering them is a change.

use crate::record::{AttachmentFile, Record, Requirement};
use crate::types::RecordId;
use blake3::Hasher;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

const SIGNATURE_VERSION: &str = "sig1";

/// Opaque cache signature of a record state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Degraded signature from the record identifier alone.
    ///
    /// Still keeps unrelated records apart but is insensitive to field changes.
    pub fn from_record_id(id: &RecordId) -> Self {
        Signature(format!("id:{}", id))
    }

    /// Whether this is the degraded identifier-only form
    pub fn is_degraded(&self) -> bool {
        self.0.starts_with("id:")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct RecordProjection<'a> {
    id: &'a str,
    status: &'a str,
    overall_status: &'a str,
    application_date: Option<NaiveDate>,
    updated_at: Option<DateTime<Utc>>,
    requirements: Vec<RequirementProjection<'a>>,
}

#[derive(Serialize)]
struct RequirementProjection<'a> {
    id: &'a str,
    files: Vec<FileProjection<'a>>,
}

#[derive(Serialize)]
struct FileProjection<'a> {
    id: &'a str,
    name: &'a str,
    status: &'a str,
    uploaded_at: Option<DateTime<Utc>>,
    content_hash: Option<&'a str>,
    size: u64,
    reference: &'a str,
    content_type: Option<&'a str>,
}

impl<'a> From<&'a Record> for RecordProjection<'a> {
    fn from(record: &'a Record) -> Self {
        RecordProjection {
            id: record.id.as_str(),
            status: &record.status,
            overall_status: &record.overall_status,
            application_date: record.application_date,
            updated_at: record.updated_at,
            requirements: record.requirements.iter().map(Into::into).collect(),
        }
    }
}

impl<'a> From<&'a Requirement> for RequirementProjection<'a> {
    fn from(requirement: &'a Requirement) -> Self {
        RequirementProjection {
            id: &requirement.id,
            files: requirement.files.iter().map(Into::into).collect(),
        }
    }
}

impl<'a> From<&'a AttachmentFile> for FileProjection<'a> {
    fn from(file: &'a AttachmentFile) -> Self {
        FileProjection {
            id: &file.id,
            name: &file.name,
            status: file.status.as_str(),
            uploaded_at: file.uploaded_at,
            content_hash: file.content_hash.as_deref(),
            size: file.size,
            reference: &file.reference,
            content_type: file.content_type.as_deref(),
        }
    }
}

/// Compute the signature of a record, or `None` when there is no record.
pub fn signature(record: Option<&Record>) -> Option<Signature> {
    let record = record?;
    let projection = RecordProjection::from(record);
    match serde_json::to_vec(&projection) {
        Ok(canonical) => Some(digest(&canonical)),
        Err(err) => {
            warn!(
                record_id = %record.id,
                error = %err,
                "Signature projection failed to serialize; using identifier-only signature"
            );
            Some(Signature::from_record_id(&record.id))
        }
    }
}

fn digest(canonical: &[u8]) -> Signature {
    let mut hasher = Hasher::new();
    hasher.update(SIGNATURE_VERSION.as_bytes());
    hasher.update(b":");
    hasher.update(canonical);
    Signature(format!(
        "{}:{}",
        SIGNATURE_VERSION,
        hex::encode(hasher.finalize().as_bytes())
    ))
}
