//! Convenience re-exports for common usage.
//!
//! ```
//! use reinhardt_doc_fixtures::prelude::*;
//!
//! let fixture = FixtureContext::new(FixtureSettings::new());
//! assert!(!fixture.is_checked());
//! ```

// Error types
pub use crate::error::{FixtureError, FixtureResult, StoreError};

// Fixture types
pub use crate::context::FixtureContext;
pub use crate::dataset::{Fields, FixtureDataset, Record, RecordSet};
pub use crate::inserter::{InsertReport, InsertionState};
pub use crate::loader::{DatasetLoader, FixtureFormat};
pub use crate::settings::FixtureSettings;

// Store clients
pub use crate::store::{MemoryStore, StoreClient};
#[cfg(feature = "mongodb")]
pub use crate::store::{MongoStore, MongoStoreBuilder};
