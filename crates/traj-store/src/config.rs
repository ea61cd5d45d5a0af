use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};

pub const DEFAULT_PROGRESS_EVERY: usize = 100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_REORDER_TOLERANCE: f64 = 1.0;
pub const DEFAULT_PDF_RMAX: f64 = 10.0;
pub const DEFAULT_PDF_DR: f64 = 0.05;
pub const DEFAULT_ANNEAL_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_ANNEAL_MU: f64 = 0.9;
pub const DEFAULT_ANNEAL_STEPS: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub reorder: ReorderConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub decorrelate: DecorrelateConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Emit NDJSON progress events on stderr.
    #[serde(default)]
    pub emit_progress: bool,
    #[serde(default)]
    pub progress_every: Option<usize>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderConfig {
    #[serde(default)]
    pub tolerance: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default)]
    pub rmax: Option<f64>,
    #[serde(default)]
    pub dr: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecorrelateConfig {
    #[serde(default, alias = "t0")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub mu: Option<f64>,
    #[serde(default)]
    pub steps: Option<usize>,
    #[serde(default)]
    pub budget: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> TrajResult<Self> {
        let cfg: EngineConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> TrajResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Copy with every optional field resolved to its default.
    pub fn normalized(&self) -> TrajResult<EngineConfig> {
        let mut cfg = self.clone();
        cfg.loader
            .progress_every
            .get_or_insert(DEFAULT_PROGRESS_EVERY);
        cfg.loader
            .poll_interval_ms
            .get_or_insert(DEFAULT_POLL_INTERVAL_MS);
        cfg.reorder.tolerance.get_or_insert(DEFAULT_REORDER_TOLERANCE);
        cfg.pdf.rmax.get_or_insert(DEFAULT_PDF_RMAX);
        cfg.pdf.dr.get_or_insert(DEFAULT_PDF_DR);
        cfg.decorrelate
            .temperature
            .get_or_insert(DEFAULT_ANNEAL_TEMPERATURE);
        cfg.decorrelate.mu.get_or_insert(DEFAULT_ANNEAL_MU);
        cfg.decorrelate.steps.get_or_insert(DEFAULT_ANNEAL_STEPS);
        cfg.decorrelate.seed.get_or_insert(0);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> TrajResult<()> {
        if self.loader.progress_every == Some(0) {
            return Err(TrajError::Invalid("loader.progress_every must be > 0".into()));
        }
        if let Some(tol) = self.reorder.tolerance {
            positive("reorder.tolerance", tol)?;
        }
        if let Some(rmax) = self.pdf.rmax {
            positive("pdf.rmax", rmax)?;
        }
        if let Some(dr) = self.pdf.dr {
            positive("pdf.dr", dr)?;
        }
        if let (Some(rmax), Some(dr)) = (self.pdf.rmax, self.pdf.dr) {
            if dr > rmax {
                return Err(TrajError::Invalid("pdf.dr must not exceed pdf.rmax".into()));
            }
        }
        if let Some(temp) = self.decorrelate.temperature {
            positive("decorrelate.temperature", temp)?;
        }
        if let Some(mu) = self.decorrelate.mu {
            if !(mu > 0.0 && mu < 1.0) {
                return Err(TrajError::Invalid(format!(
                    "decorrelate.mu must lie in (0, 1), got {mu}"
                )));
            }
        }
        if self.decorrelate.steps == Some(0) {
            return Err(TrajError::Invalid("decorrelate.steps must be > 0".into()));
        }
        if self.decorrelate.budget == Some(0) {
            return Err(TrajError::Invalid("decorrelate.budget must be > 0".into()));
        }
        Ok(())
    }
}

impl LoaderConfig {
    pub fn progress_every(&self) -> usize {
        self.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY).max(1)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS).max(1)
    }
}

impl ReorderConfig {
    pub fn tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(DEFAULT_REORDER_TOLERANCE)
    }
}

impl PdfConfig {
    pub fn rmax(&self) -> f64 {
        self.rmax.unwrap_or(DEFAULT_PDF_RMAX)
    }

    pub fn dr(&self) -> f64 {
        self.dr.unwrap_or(DEFAULT_PDF_DR)
    }
}

impl DecorrelateConfig {
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_ANNEAL_TEMPERATURE)
    }

    pub fn mu(&self) -> f64 {
        self.mu.unwrap_or(DEFAULT_ANNEAL_MU)
    }

    pub fn steps(&self) -> usize {
        self.steps.unwrap_or(DEFAULT_ANNEAL_STEPS)
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(0)
    }
}

fn positive(label: &str, value: f64) -> TrajResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TrajError::Invalid(format!("{label} must be positive, got {value}")))
    }
}
