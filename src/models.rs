use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::storage::file_name_of;

/// Identity fields pulled out of a document, keyed by field name
/// (`full_name`, `dob`, `id_number`, `expiry_date`, `address`, `doc_type`).
///
/// When an LLM reply cannot be parsed the map holds a single `raw` entry.
pub type ExtractedFields = BTreeMap<String, String>;

// ============ Session State ============

/// Self-declared applicant details submitted during onboarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BasicInfo {
    pub full_name: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
}

/// Result of the last document extraction for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub fields: ExtractedFields,
    /// Blended OCR/LLM confidence in [0, 1].
    pub confidence: f64,
}

/// Volatile onboarding session. Lives only in process memory.
///
/// Serialized snapshots report stored uploads by file name only.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub basic_info: Option<BasicInfo>,
    /// Stored document upload; later uploads overwrite.
    #[serde(rename = "document_file", serialize_with = "serialize_file_name")]
    pub document_path: Option<PathBuf>,
    /// Stored selfie upload; later uploads overwrite.
    #[serde(rename = "selfie_file", serialize_with = "serialize_file_name")]
    pub selfie_path: Option<PathBuf>,
    pub extraction: Option<ExtractionResult>,
    pub doc_confidence: Option<f64>,
    pub match_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            basic_info: None,
            document_path: None,
            selfie_path: None,
            extraction: None,
            doc_confidence: None,
            match_score: None,
            risk_score: None,
            risk_level: None,
        }
    }
}

fn serialize_file_name<S>(path: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    path.as_deref().map(file_name_of).serialize(serializer)
}

// ============ Risk ============

/// Three-level risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub explanation: String,
}

// ============ API Request/Response Models ============

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicInfoRequest {
    pub session_id: Option<String>,
    pub full_name: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BasicInfoResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentUploadResponse {
    pub session_id: String,
    pub extracted_fields: ExtractedFields,
    /// Rounded to two decimals.
    pub confidence: f64,
    pub needs_confirmation: bool,
    pub ocr_text_preview: String,
    pub llm_raw: String,
    pub uploaded_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelfieResponse {
    pub session_id: String,
    pub match_score: f64,
    pub matched: bool,
    pub method: String,
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskQueryParams {
    pub session_id: Option<String>,
    pub suspicious: Option<String>,
}

impl RiskQueryParams {
    /// Only `true` and `1` count as suspicious.
    pub fn is_suspicious(&self) -> bool {
        matches!(self.suspicious.as_deref(), Some("true") | Some("1"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RiskEvaluateResponse {
    pub session_id: String,
    /// Rounded to three decimals.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub explanation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateEventRequest {
    pub session_id: Option<String>,
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulateEventResponse {
    pub session_id: String,
    pub event: Option<String>,
    pub new_risk: RiskAssessment,
}

/// Rounds to a fixed number of decimals for presentation.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
