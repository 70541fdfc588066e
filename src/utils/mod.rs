//! Utility Module
//! Author: kartik4091
//!
//! Logging setup and metadata text/date helpers.

pub mod logger;
pub mod metadata_utils;

pub use logger::Logger;
