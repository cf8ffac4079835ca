// Inspection ETL - Core Library
// Exposes all modules for use in the CLI and tests

pub mod db;
pub mod dedup;
pub mod extract;
pub mod load;
pub mod model;
pub mod normalize;

// Re-export commonly used types
pub use dedup::{Deduplicator, InspectionKey};
pub use extract::{ExtractOptions, ExtractSummary, RowDisposition};
pub use load::{LoadOptions, LoadPaths, LoadReport, RowFailure};
pub use model::{Borough, CriticalFlag, Inspection, Restaurant, Violation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
