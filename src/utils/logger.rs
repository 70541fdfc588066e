//! Logger setup for applications embedding the analysis engine
//! Author: kartik4091
//! Created: 2025-06-05

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AnalysisConfig;

/// Installs a `tracing_subscriber` fmt subscriber. `RUST_LOG` overrides the
/// configured level.
pub struct Logger {
    level: String,
    initialized: bool,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_level("info")
    }

    pub fn with_level(level: &str) -> Self {
        Self {
            level: level.to_string(),
            initialized: false,
        }
    }

    /// Logger at the configuration's `log_level`
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::with_level(&config.log_level)
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Returns false when a global subscriber was already installed
    pub fn init(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        let installed = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .try_init()
            .is_ok();
        if installed {
            info!("Logger initialized with level: {}", self.level);
        }
        self.initialized = true;
        installed
    }

    /// Test-friendly variant that writes through the test harness capture
    pub fn init_for_tests(&mut self) {
        if !self.initialized {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(self.filter())
                .with_test_writer()
                .try_init();
            self.initialized = true;
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
