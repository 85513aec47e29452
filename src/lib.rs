// Re-export main components
pub mod api;
pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod highlight;
pub mod index;
pub mod listing;
pub mod ranking;
pub mod scanner;
pub mod service;
pub mod storage;
pub mod tokenizer;
pub mod typo;

// Re-export commonly used types
pub use backend::{LocalBackend, MeiliBackend, SearchBackend};
pub use config::{BackendKind, Config};
pub use document::Document;
pub use error::{BackendError, InitError, ScanError, SearchError};
pub use scanner::{CorpusScanner, ScanReport};
pub use service::{SearchResult, SearchService, ServiceState};
pub use storage::Storage;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
