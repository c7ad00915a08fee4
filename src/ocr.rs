//! OCR stage of the document pipeline.
//!
//! The production engine shells out to the `tesseract` binary and reads its
//! TSV output, which carries per-word confidences grouped by block.

use crate::config::ConfidenceTuning;
use crate::errors::AppError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Recognized text plus a heuristic confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Runs text recognition over an image stored on disk.
    async fn recognize(&self, path: &Path) -> Result<OcrOutput, AppError>;
}

/// Tesseract CLI engine.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    lang: String,
    tuning: ConfidenceTuning,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, lang: impl Into<String>, tuning: ConfidenceTuning) -> Self {
        Self {
            command: command.into(),
            lang: lang.into(),
            tuning,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, path: &Path) -> Result<OcrOutput, AppError> {
        tracing::info!("Running OCR ({}) on {}", self.lang, path.display());

        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("tsv")
            .output()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to run {}: {}", self.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ExternalApiError(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let page = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        let confidence = ocr_confidence(&page.block_confidences, &self.tuning);

        tracing::debug!(
            "OCR produced {} chars across {} blocks (confidence {:.2})",
            page.text.len(),
            page.block_confidences.len(),
            confidence
        );

        Ok(OcrOutput {
            text: page.text,
            confidence,
        })
    }
}

/// Text and per-block confidences recovered from Tesseract TSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsvPage {
    pub text: String,
    /// Mean word confidence (0-100) per block; `None` for blocks with no scored words.
    pub block_confidences: Vec<Option<f64>>,
}

const WORD_LEVEL: u32 = 5;
const BLOCK_LEVEL: u32 = 2;

/// Parses `tesseract ... tsv` output.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Unparseable rows (including the header)
/// are skipped.
pub fn parse_tsv(tsv: &str) -> TsvPage {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(u32, u32, u32, u32)> = None;

    // (page, block) -> (sum, count)
    let mut blocks: Vec<((u32, u32), f64, usize)> = Vec::new();

    for row in tsv.lines() {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 11 {
            continue;
        }
        let nums: Option<Vec<u32>> = cols[..5].iter().map(|c| c.trim().parse().ok()).collect();
        let Some(nums) = nums else { continue };
        let (level, page, block, par, line) = (nums[0], nums[1], nums[2], nums[3], nums[4]);

        if level == BLOCK_LEVEL {
            blocks.push(((page, block), 0.0, 0));
            continue;
        }
        if level != WORD_LEVEL {
            continue;
        }

        let word = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if word.is_empty() {
            continue;
        }

        let key = (page, block, par, line);
        if current_line == Some(key) {
            if let Some(last) = lines.last_mut() {
                last.push(' ');
                last.push_str(word);
            }
        } else {
            lines.push(word.to_string());
            current_line = Some(key);
        }

        let conf: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if conf >= 0.0 {
            if let Some(entry) = blocks.iter_mut().rev().find(|(k, _, _)| *k == (page, block)) {
                entry.1 += conf;
                entry.2 += 1;
            }
        }
    }

    TsvPage {
        text: lines.join("\n"),
        block_confidences: blocks
            .into_iter()
            .map(|(_, sum, count)| (count > 0).then(|| sum / count as f64))
            .collect(),
    }
}

/// Averages block confidences (0-100 scale) into a clamped [0, 1] value.
pub fn ocr_confidence(block_confidences: &[Option<f64>], tuning: &ConfidenceTuning) -> f64 {
    let raw = if block_confidences.is_empty() {
        tuning.ocr_default
    } else {
        let sum: f64 = block_confidences
            .iter()
            .map(|c| c.unwrap_or(tuning.ocr_block_default))
            .sum();
        sum / block_confidences.len() as f64 / 100.0
    };

    raw.clamp(tuning.ocr_min, tuning.ocr_max)
}
