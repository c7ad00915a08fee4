use std::path::PathBuf;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o-mini";
const DEFAULT_FALLBACK_MODEL: &str = "gpt-3.5-turbo-16k";

/// Heuristic confidence constants used by the extraction pipeline.
///
/// None of these values are calibrated; they are configurable so they can be
/// tuned per deployment.
#[derive(Debug, Clone)]
pub struct ConfidenceTuning {
    /// OCR confidence when the engine reports no blocks.
    pub ocr_default: f64,
    /// Per-block confidence (0-100 scale) for blocks with no scored words.
    pub ocr_block_default: f64,
    pub ocr_min: f64,
    pub ocr_max: f64,
    /// Clamp bounds for a confidence self-reported by the LLM.
    pub llm_reported_min: f64,
    pub llm_reported_max: f64,
    /// LLM returned a JSON block but no numeric `confidence`.
    pub llm_unreported: f64,
    /// LLM reply was a JSON value other than an object (no `{...}` span).
    pub llm_bare_json: f64,
    /// LLM reply could not be parsed at all.
    pub llm_unparsed: f64,
    /// Confidence of the regex extractor used without an API key.
    pub heuristic: f64,
    pub blend_ocr_weight: f64,
    pub blend_llm_weight: f64,
    pub blend_min: f64,
    pub blend_max: f64,
}

impl Default for ConfidenceTuning {
    fn default() -> Self {
        Self {
            ocr_default: 0.6,
            ocr_block_default: 60.0,
            ocr_min: 0.3,
            ocr_max: 0.98,
            llm_reported_min: 0.2,
            llm_reported_max: 0.99,
            llm_unreported: 0.8,
            llm_bare_json: 0.7,
            llm_unparsed: 0.6,
            heuristic: 0.55,
            blend_ocr_weight: 0.6,
            blend_llm_weight: 0.4,
            blend_min: 0.25,
            blend_max: 0.99,
        }
    }
}

/// Weights and thresholds of the risk formula.
#[derive(Debug, Clone)]
pub struct RiskWeights {
    pub doc_weight: f64,
    pub match_weight: f64,
    pub suspicious_penalty: f64,
    /// Scores strictly below this are LOW.
    pub low_threshold: f64,
    /// Scores strictly below this (and not LOW) are MEDIUM.
    pub high_threshold: f64,
    /// Match score at or above which the selfie is reported as matched.
    pub match_threshold: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            doc_weight: 0.6,
            match_weight: 0.4,
            suspicious_penalty: 0.4,
            low_threshold: 0.3,
            high_threshold: 0.7,
            match_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub app_name: String,
    pub storage_path: PathBuf,
    pub frontend_origins: Vec<String>,
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_fallback_model: String,
    pub tesseract_cmd: String,
    pub tesseract_lang: String,
    pub tuning: ConfidenceTuning,
    pub risk: RiskWeights,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            app_name: non_empty_var("APP_NAME").unwrap_or_else(|| "KYC Gateway API".to_string()),
            storage_path: PathBuf::from(
                non_empty_var("STORAGE_PATH").unwrap_or_else(|| "./uploads".to_string()),
            ),
            frontend_origins: parse_origins(
                &std::env::var("FRONTEND_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            ),
            public_base_url: non_empty_var("PUBLIC_BASE_URL")
                .map(|url| {
                    require_http_url("PUBLIC_BASE_URL", &url)?;
                    Ok::<_, anyhow::Error>(url.trim_end_matches('/').to_string())
                })
                .transpose()?,
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_BYTES must be a positive integer"))?,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL")
                .map(|url| {
                    require_http_url("OPENAI_BASE_URL", &url)?;
                    Ok::<_, anyhow::Error>(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: non_empty_var("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            openai_fallback_model: non_empty_var("OPENAI_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            tesseract_cmd: non_empty_var("TESSERACT_CMD")
                .unwrap_or_else(|| "tesseract".to_string()),
            tesseract_lang: non_empty_var("TESSERACT_LANG").unwrap_or_else(|| "eng".to_string()),
            tuning: ConfidenceTuning::from_env()?,
            risk: RiskWeights::from_env()?,
        };

        if config.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::debug!("Storage path: {}", config.storage_path.display());
        tracing::debug!("CORS origins: {:?}", config.frontend_origins);
        if config.openai_api_key.is_some() {
            tracing::info!(
                "OpenAI extraction enabled (model {}, fallback {})",
                config.openai_model,
                config.openai_fallback_model
            );
        } else {
            tracing::warn!("OPENAI_API_KEY not set, using regex field extraction");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

impl ConfidenceTuning {
    fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();
        let tuning = Self {
            ocr_default: env_f64("KYC_OCR_DEFAULT_CONFIDENCE", d.ocr_default)?,
            ocr_block_default: env_f64("KYC_OCR_BLOCK_DEFAULT", d.ocr_block_default)?,
            ocr_min: env_f64("KYC_OCR_MIN_CONFIDENCE", d.ocr_min)?,
            ocr_max: env_f64("KYC_OCR_MAX_CONFIDENCE", d.ocr_max)?,
            llm_reported_min: env_f64("KYC_LLM_MIN_CONFIDENCE", d.llm_reported_min)?,
            llm_reported_max: env_f64("KYC_LLM_MAX_CONFIDENCE", d.llm_reported_max)?,
            llm_unreported: env_f64("KYC_LLM_UNREPORTED_CONFIDENCE", d.llm_unreported)?,
            llm_bare_json: env_f64("KYC_LLM_BARE_JSON_CONFIDENCE", d.llm_bare_json)?,
            llm_unparsed: env_f64("KYC_LLM_UNPARSED_CONFIDENCE", d.llm_unparsed)?,
            heuristic: env_f64("KYC_HEURISTIC_CONFIDENCE", d.heuristic)?,
            blend_ocr_weight: env_f64("KYC_BLEND_OCR_WEIGHT", d.blend_ocr_weight)?,
            blend_llm_weight: env_f64("KYC_BLEND_LLM_WEIGHT", d.blend_llm_weight)?,
            blend_min: env_f64("KYC_BLEND_MIN", d.blend_min)?,
            blend_max: env_f64("KYC_BLEND_MAX", d.blend_max)?,
        };

        for (name, lo, hi) in [
            ("KYC_OCR_*_CONFIDENCE", tuning.ocr_min, tuning.ocr_max),
            ("KYC_LLM_*_CONFIDENCE", tuning.llm_reported_min, tuning.llm_reported_max),
            ("KYC_BLEND_MIN/MAX", tuning.blend_min, tuning.blend_max),
        ] {
            if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
                anyhow::bail!("{} bounds must satisfy 0 <= min <= max <= 1", name);
            }
        }

        Ok(tuning)
    }
}

impl RiskWeights {
    fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();
        let weights = Self {
            doc_weight: env_f64("KYC_RISK_DOC_WEIGHT", d.doc_weight)?,
            match_weight: env_f64("KYC_RISK_MATCH_WEIGHT", d.match_weight)?,
            suspicious_penalty: env_f64("KYC_RISK_SUSPICIOUS_PENALTY", d.suspicious_penalty)?,
            low_threshold: env_f64("KYC_RISK_LOW_THRESHOLD", d.low_threshold)?,
            high_threshold: env_f64("KYC_RISK_HIGH_THRESHOLD", d.high_threshold)?,
            match_threshold: env_f64("KYC_MATCH_THRESHOLD", d.match_threshold)?,
        };

        weights.validate()?;
        Ok(weights)
    }

    /// Rejects weights that could push a score outside [0, 1] or invert the
    /// effect of the suspicious flag.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.doc_weight < 0.0 || self.match_weight < 0.0 {
            anyhow::bail!("KYC_RISK_*_WEIGHT values cannot be negative");
        }
        if self.suspicious_penalty < 0.0 {
            anyhow::bail!("KYC_RISK_SUSPICIOUS_PENALTY cannot be negative");
        }
        for (name, value) in [
            ("KYC_RISK_LOW_THRESHOLD", self.low_threshold),
            ("KYC_RISK_HIGH_THRESHOLD", self.high_threshold),
            ("KYC_MATCH_THRESHOLD", self.match_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1", name);
            }
        }
        if self.low_threshold > self.high_threshold {
            anyhow::bail!("KYC_RISK_LOW_THRESHOLD cannot exceed KYC_RISK_HIGH_THRESHOLD");
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_f64(name: &str, default: f64) -> anyhow::Result<f64> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", name, raw))?;
            if !value.is_finite() {
                anyhow::bail!("{} must be finite", name);
            }
            Ok(value)
        }
    }
}

fn require_http_url(name: &str, value: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(())
}

/// Splits a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_trims_and_skips_blanks() {
        let origins = parse_origins(" http://a.test , ,http://b.test");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_default_tuning_matches_pipeline_constants() {
        let t = ConfidenceTuning::default();
        assert_eq!(t.blend_ocr_weight, 0.6);
        assert_eq!(t.blend_llm_weight, 0.4);
        assert_eq!(t.heuristic, 0.55);
        assert_eq!(t.ocr_min, 0.3);
        assert_eq!(t.ocr_max, 0.98);
    }

    #[test]
    fn test_risk_weights_validation() {
        assert!(RiskWeights::default().validate().is_ok());

        let negative_penalty = RiskWeights {
            suspicious_penalty: -0.5,
            ..RiskWeights::default()
        };
        assert!(negative_penalty.validate().is_err());

        let threshold_above_one = RiskWeights {
            high_threshold: 1.5,
            ..RiskWeights::default()
        };
        assert!(threshold_above_one.validate().is_err());

        let negative_match = RiskWeights {
            match_threshold: -0.1,
            ..RiskWeights::default()
        };
        assert!(negative_match.validate().is_err());

        let inverted = RiskWeights {
            low_threshold: 0.8,
            high_threshold: 0.4,
            ..RiskWeights::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_require_http_url() {
        assert!(require_http_url("X", "https://api.openai.com/v1").is_ok());
        assert!(require_http_url("X", "ftp://example.com").is_err());
        assert!(require_http_url("X", "not a url").is_err());
    }
}
