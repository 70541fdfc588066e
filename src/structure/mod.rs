//! Structure handling modules for PDF structure analysis
//! Author: kartik4091

pub mod cross_ref;
pub mod cross_ref_handler;
pub mod decryption;
pub mod graph;
pub mod linearization;
pub mod object_stream;
pub mod parser;
pub mod progress;
pub mod stream_processor;
pub mod structure_handler;

pub use cross_ref::{XrefEntry, XrefKind};
pub use cross_ref_handler::{ChainFault, CrossRefHandler, Revision, XrefChain};
pub use decryption::{Decryption, StreamDecryptor};
pub use graph::{DocumentFacts, DocumentGraph, DocumentInfo, RevisionView};
pub use linearization::{LinearizationHandler, LinearizationInfo};
pub use parser::PdfParser;
pub use progress::{AnalysisStage, AnalysisWarning};
pub use stream_processor::StreamProcessor;
pub use structure_handler::{StructureHandler, StructureMetrics};
