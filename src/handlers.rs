use crate::biometric::{file_hash_similarity, MATCH_METHOD, MATCH_NOTE};
use crate::config::Config;
use crate::errors::AppError;
use crate::llm::{FieldExtractor, HeuristicExtractor, OpenAiExtractor};
use crate::models::*;
use crate::ocr::TesseractOcr;
use crate::pipeline::DocumentPipeline;
use crate::risk::compute_risk_score_with;
use crate::session_store::SessionStore;
use crate::storage::{file_name_of, save_upload};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;

const OCR_PREVIEW_CHARS: usize = 400;
const LLM_RAW_CHARS: usize = 1200;
const SUSPICIOUS_EVENT: &str = "suspicious_transaction";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// In-memory sessions, documents and selfies.
    pub sessions: SessionStore,
    /// OCR + field extraction pipeline.
    pub pipeline: DocumentPipeline,
}

impl AppState {
    /// Wires the production OCR engine and picks the field extractor:
    /// OpenAI when an API key is configured, regex heuristics otherwise.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let ocr = Arc::new(TesseractOcr::new(
            config.tesseract_cmd.clone(),
            config.tesseract_lang.clone(),
            config.tuning.clone(),
        ));

        let extractor: Arc<dyn FieldExtractor> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiExtractor::new(
                config.openai_base_url.clone(),
                key.clone(),
                config.openai_model.clone(),
                config.openai_fallback_model.clone(),
                config.tuning.clone(),
            )),
            None => Arc::new(HeuristicExtractor::new(&config.tuning)?),
        };

        let pipeline = DocumentPipeline::new(ocr, extractor, config.tuning.clone());

        Ok(Self {
            config,
            sessions: SessionStore::new(),
            pipeline,
        })
    }
}

/// GET /
///
/// Liveness probe returning the configured service name.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": state.config.app_name,
    }))
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /session/start
pub async fn start_session(State(state): State<Arc<AppState>>) -> Json<SessionStartResponse> {
    let session = state.sessions.create().await;

    Json(SessionStartResponse {
        session_id: session.id,
        status: "session_created".to_string(),
    })
}

/// GET /session/:id
///
/// Returns the full session snapshot (basic info, uploads, last risk result).
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    let session = state.sessions.require(Some(id.as_str())).await?;
    Ok(Json(session))
}

/// POST /onboarding/submit-basic-info
pub async fn submit_basic_info(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BasicInfoRequest>,
) -> Result<Json<BasicInfoResponse>, AppError> {
    let session = state.sessions.require(payload.session_id.as_deref()).await?;
    tracing::info!("POST /onboarding/submit-basic-info - session: {}", session.id);

    state
        .sessions
        .set_basic_info(
            &session.id,
            BasicInfo {
                full_name: payload.full_name,
                dob: payload.dob,
                address: payload.address,
            },
        )
        .await?;

    Ok(Json(BasicInfoResponse {
        session_id: session.id,
        status: "basic_info_saved".to_string(),
    }))
}

/// POST /document/upload
///
/// Multipart form with `session_id` and `file`. Stores the file, runs the
/// extraction pipeline and reports the fields with a blended confidence.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>, AppError> {
    let form = read_upload_form(multipart, "file", state.config.max_upload_bytes).await?;
    let session = state.sessions.require(form.session_id.as_deref()).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("file missing".to_string()))?;

    tracing::info!(
        "POST /document/upload - session: {}, file: {} ({} bytes)",
        session.id,
        file.name,
        file.bytes.len()
    );

    let path = save_upload(&file.bytes, &file.name, &state.config.storage_path).await?;
    state.sessions.set_document(&session.id, path.clone()).await?;

    let output = state.pipeline.run(&path).await?;

    state
        .sessions
        .set_extraction(
            &session.id,
            ExtractionResult {
                fields: output.fields.clone(),
                confidence: output.confidence,
            },
        )
        .await?;

    let name_mismatch = needs_confirmation(session.basic_info.as_ref(), &output.fields);
    if name_mismatch {
        tracing::info!("Session {}: extracted name differs from declared name", session.id);
    }

    Ok(Json(DocumentUploadResponse {
        session_id: session.id,
        extracted_fields: output.fields,
        confidence: round_to(output.confidence, 2),
        needs_confirmation: name_mismatch,
        ocr_text_preview: truncate_chars(&output.ocr_text, OCR_PREVIEW_CHARS),
        llm_raw: truncate_chars(&output.llm_raw, LLM_RAW_CHARS),
        uploaded_url: public_url(&state.config, &headers, &path),
    }))
}

/// POST /biometric/selfie
///
/// Multipart form with `session_id` and `selfie`. The match score is the
/// file-hash placeholder, not a face comparison.
pub async fn upload_selfie(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SelfieResponse>, AppError> {
    let form = read_upload_form(multipart, "selfie", state.config.max_upload_bytes).await?;
    let session = state.sessions.require(form.session_id.as_deref()).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("selfie missing".to_string()))?;

    tracing::info!("POST /biometric/selfie - session: {}", session.id);

    let selfie_path = save_upload(&file.bytes, &file.name, &state.config.storage_path).await?;
    state
        .sessions
        .set_selfie(&session.id, selfie_path.clone())
        .await?;

    let document_path = session
        .document_path
        .ok_or_else(|| AppError::BadRequest("document not uploaded".to_string()))?;

    let match_score = file_hash_similarity(&document_path, &selfie_path).await;
    state
        .sessions
        .set_match_score(&session.id, match_score)
        .await?;

    Ok(Json(SelfieResponse {
        session_id: session.id,
        match_score,
        matched: match_score >= state.config.risk.match_threshold,
        method: MATCH_METHOD.to_string(),
        note: MATCH_NOTE.to_string(),
    }))
}

/// GET /risk/evaluate?session_id=...&suspicious=true
pub async fn evaluate_risk(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RiskQueryParams>,
) -> Result<Json<RiskEvaluateResponse>, AppError> {
    let session = state.sessions.require(params.session_id.as_deref()).await?;
    let suspicious = params.is_suspicious();

    let (doc_confidence, match_score) = risk_inputs(&session).await;
    let risk = compute_risk_score_with(&state.config.risk, doc_confidence, match_score, suspicious);

    state
        .sessions
        .record_risk(&session.id, &risk, Some((doc_confidence, match_score)))
        .await?;

    tracing::info!(
        "Risk for session {}: {:.3} ({})",
        session.id,
        risk.score,
        risk.level
    );

    Ok(Json(RiskEvaluateResponse {
        session_id: session.id,
        risk_score: round_to(risk.score, 3),
        risk_level: risk.level,
        explanation: risk.explanation,
    }))
}

/// POST /events/simulate
///
/// Recomputes risk; only `suspicious_transaction` events count as suspicious.
pub async fn simulate_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SimulateEventRequest>,
) -> Result<Json<SimulateEventResponse>, AppError> {
    let session = state.sessions.require(payload.session_id.as_deref()).await?;
    let suspicious = payload.event_type.as_deref() == Some(SUSPICIOUS_EVENT);

    tracing::info!(
        "POST /events/simulate - session: {}, event: {:?}",
        session.id,
        payload.event_type
    );

    let (doc_confidence, match_score) = risk_inputs(&session).await;
    let mut risk =
        compute_risk_score_with(&state.config.risk, doc_confidence, match_score, suspicious);
    state.sessions.record_risk(&session.id, &risk, None).await?;

    risk.score = round_to(risk.score, 3);
    Ok(Json(SimulateEventResponse {
        session_id: session.id,
        event: payload.event_type,
        new_risk: risk,
    }))
}

/// Document confidence from the last upload and a fresh match score.
async fn risk_inputs(session: &Session) -> (f64, f64) {
    let doc_confidence = session.doc_confidence.unwrap_or(0.0);
    let match_score = match (&session.document_path, &session.selfie_path) {
        (Some(doc), Some(selfie)) => file_hash_similarity(doc, selfie).await,
        _ => 0.0,
    };
    (doc_confidence, match_score)
}

/// True when the applicant declared a name that the document does not contain.
pub fn needs_confirmation(basic: Option<&BasicInfo>, fields: &ExtractedFields) -> bool {
    let declared = basic
        .and_then(|b| b.full_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let extracted = fields
        .get("full_name")
        .map(|n| n.trim())
        .filter(|n| !n.is_empty());

    match (declared, extracted) {
        (Some(declared), Some(extracted)) => !extracted
            .to_lowercase()
            .contains(&declared.to_lowercase()),
        _ => false,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// URL under which the static `/uploads` route serves a stored file.
fn public_url(config: &Config, headers: &HeaderMap, path: &FsPath) -> String {
    let base = config.public_base_url.clone().unwrap_or_else(|| {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("localhost:{}", config.port));
        format!("http://{}", host)
    });
    let name = file_name_of(path);

    let mut url = match url::Url::parse(&base) {
        Ok(url) => url,
        Err(_) => return format!("{}/uploads/{}", base, name),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("uploads").push(&name);
    }
    url.to_string()
}

// ============ Multipart ============

struct UploadedFile {
    name: String,
    bytes: Bytes,
}

struct UploadForm {
    session_id: Option<String>,
    file: Option<UploadedFile>,
}

/// Reads `session_id` and one file field. Other fields are ignored.
async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
    max_bytes: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        session_id: None,
        file: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("session_id") => {
                form.session_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some(name) if name == file_field => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "file exceeds {} byte limit",
                        max_bytes
                    )));
                }
                form.file = Some(UploadedFile {
                    name: file_name,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_with_name(name: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        fields.insert("full_name".to_string(), name.to_string());
        fields
    }

    #[test]
    fn test_needs_confirmation_matching_name() {
        let basic = BasicInfo {
            full_name: Some("jane doe".to_string()),
            ..Default::default()
        };
        assert!(!needs_confirmation(Some(&basic), &fields_with_name("MS JANE DOE")));
    }

    #[test]
    fn test_needs_confirmation_mismatch() {
        let basic = BasicInfo {
            full_name: Some("John Smith".to_string()),
            ..Default::default()
        };
        assert!(needs_confirmation(Some(&basic), &fields_with_name("JANE DOE")));
    }

    #[test]
    fn test_needs_confirmation_without_data() {
        assert!(!needs_confirmation(None, &fields_with_name("JANE DOE")));
        let basic = BasicInfo {
            full_name: Some("Jane".to_string()),
            ..Default::default()
        };
        assert!(!needs_confirmation(Some(&basic), &ExtractedFields::new()));
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
