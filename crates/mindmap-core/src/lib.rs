pub mod config;
pub mod config_file;
pub mod document;
pub mod error;
pub mod extract;
pub mod partial_json;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod shell;
pub mod tree;
pub mod validate;

// Re-export for convenience
pub use config::Config;
pub use document::{CandidateFile, Document, EncodedDocument, IntakePolicy, UploadPayload};
pub use error::{
    ConfigError, ExtractionError, InputRejected, REJECTION_NOTICE, TransportCause,
    USER_FAILURE_MESSAGE,
};
pub use extract::{ExtractionEvent, Extractor, PartialAccumulator};
pub use partial_json::{PartialParse, parse_partial};
pub use provider::{GeminiProvider, GenerationProvider, MockProvider, MockStep};
pub use schema::{ExtractionResult, KeyPoint, PartialExtractionResult, PartialKeyPoint};
pub use shell::{Notice, Phase, Shell};
pub use tree::{Node, Placeholders, project};
pub use validate::{Violation, validate_complete, validate_partial};
