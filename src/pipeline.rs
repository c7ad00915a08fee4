//! Document extraction pipeline: OCR, then field extraction, then a
//! confidence blend.

use crate::config::ConfidenceTuning;
use crate::errors::AppError;
use crate::llm::FieldExtractor;
use crate::models::ExtractedFields;
use crate::ocr::OcrEngine;
use std::path::Path;
use std::sync::Arc;

/// Everything the upload endpoint reports about a processed document.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub fields: ExtractedFields,
    /// Blended confidence.
    pub confidence: f64,
    pub ocr_confidence: f64,
    pub llm_confidence: f64,
    pub ocr_text: String,
    pub llm_raw: String,
}

#[derive(Clone)]
pub struct DocumentPipeline {
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn FieldExtractor>,
    tuning: ConfidenceTuning,
}

impl DocumentPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        extractor: Arc<dyn FieldExtractor>,
        tuning: ConfidenceTuning,
    ) -> Self {
        Self {
            ocr,
            extractor,
            tuning,
        }
    }

    /// Runs both stages sequentially. Any stage failure is reported as a
    /// single processing error; no partial result is returned.
    pub async fn run(&self, path: &Path) -> Result<PipelineOutput, AppError> {
        let ocr = self
            .ocr
            .recognize(path)
            .await
            .map_err(AppError::processing_failed)?;

        let llm = self
            .extractor
            .extract(&ocr.text)
            .await
            .map_err(AppError::processing_failed)?;

        let confidence = blend_confidence(ocr.confidence, llm.confidence, &self.tuning);

        tracing::info!(
            "Extracted {} fields via {} (ocr {:.2}, llm {:.2}, combined {:.2})",
            llm.fields.len(),
            self.extractor.name(),
            ocr.confidence,
            llm.confidence,
            confidence
        );

        Ok(PipelineOutput {
            fields: llm.fields,
            confidence,
            ocr_confidence: ocr.confidence,
            llm_confidence: llm.confidence,
            ocr_text: ocr.text,
            llm_raw: llm.raw,
        })
    }
}

/// `clamp(ocr_weight * ocr + llm_weight * llm, blend_min, blend_max)`.
pub fn blend_confidence(ocr: f64, llm: f64, tuning: &ConfidenceTuning) -> f64 {
    let combined = tuning.blend_ocr_weight * ocr + tuning.blend_llm_weight * llm;
    if combined.is_nan() {
        return tuning.blend_min;
    }
    combined.clamp(tuning.blend_min, tuning.blend_max)
}
