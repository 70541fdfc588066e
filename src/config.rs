//! Configuration types and validation for the analysis engine
//! Author: kartik4091
//! Created: 2025-06-03

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::forensics::anomaly::AnomalyKind;

/// Tunables for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upper bound on `/Prev` hops; the effective bound is also capped by
    /// the buffer size
    pub max_xref_hops: usize,
    /// Maximum nesting of arrays and dictionaries inside one object
    pub max_parse_depth: usize,
    /// Bytes a single scanner token match may inspect
    pub scan_lookahead: usize,
    /// Cap on the decoded size of xref and object streams
    pub max_decoded_stream_size: usize,
    /// Evaluate detection rules on the rayon pool
    pub parallel_rules: bool,
    /// Orphaned streams at least this large are rated at the top severity
    pub orphan_large_payload: usize,
    /// Slack allowed between related metadata timestamps
    pub metadata_tolerance_secs: i64,
    /// Non-whitespace bytes tolerated after the final `%%EOF`
    pub trailing_data_threshold: usize,
    /// Node visits spent walking revisions before the final one. Older
    /// revisions past the budget are left unresolved.
    pub max_view_work: usize,
    /// Rules that are skipped entirely
    pub disabled_rules: Vec<AnomalyKind>,
    /// Filter directive handed to `utils::logger::Logger` by
    /// `PdfAnalyzer::logger`
    pub log_level: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_xref_hops: 4096,
            max_parse_depth: 64,
            scan_lookahead: 64,
            max_decoded_stream_size: 64 * 1024 * 1024,
            parallel_rules: true,
            orphan_large_payload: 1024,
            metadata_tolerance_secs: 60,
            trailing_data_threshold: 32,
            max_view_work: 2_000_000,
            disabled_rules: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_xref_hops == 0 {
            return Err(Error::InvalidConfiguration("max_xref_hops must be at least 1".into()));
        }
        if self.max_parse_depth < 2 {
            return Err(Error::InvalidConfiguration("max_parse_depth must be at least 2".into()));
        }
        if self.scan_lookahead < 16 {
            return Err(Error::InvalidConfiguration("scan_lookahead must be at least 16 bytes".into()));
        }
        if self.max_decoded_stream_size == 0 {
            return Err(Error::InvalidConfiguration("max_decoded_stream_size must be non-zero".into()));
        }
        if self.metadata_tolerance_secs < 0 {
            return Err(Error::InvalidConfiguration("metadata_tolerance_secs cannot be negative".into()));
        }
        EnvFilter::try_new(&self.log_level)
            .map_err(|e| Error::ConfigError(format!("log_level {:?}: {}", self.log_level, e)))?;
        Ok(())
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file; `.json` is parsed as JSON, anything else
    /// as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading analysis configuration");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&source),
            _ => Self::from_yaml_str(&source),
        }
    }

    pub fn is_rule_enabled(&self, kind: AnomalyKind) -> bool {
        !self.disabled_rules.contains(&kind)
    }

    /// Hop bound actually applied for a buffer of `len` bytes. No xref
    /// section fits in fewer than 16 bytes, so a longer honest chain cannot
    /// exist.
    pub fn effective_hop_limit(&self, len: usize) -> usize {
        self.max_xref_hops.min(len / 16 + 1).max(1)
    }
}
