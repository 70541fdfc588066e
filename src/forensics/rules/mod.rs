//! Built-in detection rules

pub mod concealment;
pub mod encryption;
pub mod eof;
pub mod free_list;
pub mod hybrid;
pub mod malformed;
pub mod metadata;
pub mod orphaned;
pub mod references;
pub mod stream_length;
pub mod unindexed;
pub mod xref_chain;

pub use concealment::IncrementalConcealmentRule;
pub use encryption::UnsupportedEncryptionRule;
pub use eof::EofMarkerRule;
pub use free_list::FreeListRule;
pub use hybrid::HybridXrefConflictRule;
pub use malformed::MalformedDefinitionRule;
pub use metadata::MetadataConsistencyRule;
pub use orphaned::OrphanedObjectRule;
pub use references::UnresolvableReferenceRule;
pub use stream_length::StreamLengthRule;
pub use unindexed::UnindexedObjectRule;
pub use xref_chain::{ChainFaultRule, GenerationRegressionRule};

use crate::config::AnalysisConfig;
use crate::forensics::detector::AnomalyRule;

pub fn default_rules(config: &AnalysisConfig) -> Vec<Box<dyn AnomalyRule>> {
    vec![
        Box::new(OrphanedObjectRule::new(config.orphan_large_payload)),
        Box::new(IncrementalConcealmentRule),
        Box::new(StreamLengthRule),
        Box::new(FreeListRule),
        Box::new(ChainFaultRule),
        Box::new(GenerationRegressionRule),
        Box::new(MetadataConsistencyRule::new(config.metadata_tolerance_secs)),
        Box::new(UnresolvableReferenceRule),
        Box::new(MalformedDefinitionRule),
        Box::new(UnsupportedEncryptionRule),
        Box::new(UnindexedObjectRule),
        Box::new(HybridXrefConflictRule),
        Box::new(EofMarkerRule::new(config.trailing_data_threshold)),
    ]
}
