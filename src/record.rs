//! Application records as read by the preview pipeline.
//!
//! Records are owned by the external record store; the pipeline only reads them.
//! Requirement and file order is significant and is never re-sorted.

use crate::types::RecordId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A business-permit application record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub overall_status: String,
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
    /// Last-modified marker maintained by the record store
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// A requirement of the application and its uploaded files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub files: Vec<AttachmentFile>,
}

/// A supporting file uploaded against a requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub size: u64,
    /// Retrieval reference (URL or storage key) passed to the attachment fetcher
    pub reference: String,
    /// Content type recorded at upload; used when retrieval does not report one
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Review status of an attachment file
///
/// Unknown values are kept verbatim so that they still participate in signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Other(String),
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Other(value) => value,
        }
    }
}

impl From<String> for ApprovalStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pending" => ApprovalStatus::Pending,
            "approved" => ApprovalStatus::Approved,
            "rejected" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Other(value),
        }
    }
}

impl From<ApprovalStatus> for String {
    fn from(value: ApprovalStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            status: String::new(),
            overall_status: String::new(),
            application_date: None,
            updated_at: None,
            requirements: Vec::new(),
        }
    }

    /// All files in record order: requirement order first, then file order within it.
    pub fn files(&self) -> impl Iterator<Item = &AttachmentFile> {
        self.requirements.iter().flat_map(|r| r.files.iter())
    }

    /// Files whose status is one of `accepted` (case-insensitive), in record order.
    pub fn accepted_files<'a>(
        &'a self,
        accepted: &'a [String],
    ) -> impl Iterator<Item = &'a AttachmentFile> + 'a {
        self.files().filter(move |file| {
            accepted
                .iter()
                .any(|status| status.eq_ignore_ascii_case(file.status.as_str()))
        })
    }

    pub fn find_file_mut(&mut self, file_id: &str) -> Option<&mut AttachmentFile> {
        self.requirements
            .iter_mut()
            .flat_map(|r| r.files.iter_mut())
            .find(|f| f.id == file_id)
    }
}
