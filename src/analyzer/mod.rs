//! Analyzer Module
//! Author: kartik4091
//!
//! Entry point tying the structure stage and the detector together.

pub mod pdf_analyzer;

pub use self::pdf_analyzer::{PdfAnalyzer, PdfAnalyzerStats};
