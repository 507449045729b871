//! Reference-aware fixture loading for document databases.
//!
//! A fixture is a set of named collections, each a set of named records.
//! Records may refer to records of other collections by key; those references
//! are replaced with the identifiers the store assigns at insertion time, and
//! the referenced collections are inserted first.
//!
//! # Features
//!
//! - `yaml` - YAML fixture files (enabled by default)
//! - `mongodb` - [`MongoStore`](store::MongoStore), a blocking MongoDB client
//! - `full` - All features enabled
//!
//! # Quick Start
//!
//! Fixture files live in one directory per fixture, one file per collection
//! (`test/fixtures/blog/users.yaml`):
//!
//! ```yaml
//! pepe:
//!   name: Jonah
//!   password: { raw: secret, processed: 35ferwt352 }
//! ```
//!
//! and `test/fixtures/blog/comments.yaml`:
//!
//! ```yaml
//! flamewar:
//!   user: { users: pepe }
//!   text: FLAME
//! ```
//!
//! Push it, use it, roll it back:
//!
//! ```no_run
//! use std::sync::Arc;
//! use reinhardt_doc_fixtures::prelude::*;
//!
//! # fn example() -> FixtureResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let mut fixture = FixtureContext::open(FixtureSettings::new(), "blog", store)?;
//!
//! let comment = fixture.stored("comments", "flamewar")?;
//! fixture.rollback()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`FixtureDataset`] - Collections and records of a loaded fixture
//! - [`DatasetLoader`] - Reads fixture directories (JSON, YAML)
//! - [`resolver`] - Turns fixture values into stored values
//! - [`Inserter`](inserter::Inserter) - Dependency-ordered insertion
//! - [`FixtureContext`] - Load, check, push, rollback
//! - [`StoreClient`] - The document store seam

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
pub mod dataset;
pub mod error;
pub mod inserter;
pub mod loader;
pub mod prelude;
pub mod resolver;
pub mod settings;
pub mod stash;
pub mod store;

// Re-export commonly used types at crate root
pub use context::FixtureContext;
pub use dataset::{Fields, FixtureDataset, Record, RecordSet};
pub use error::{FixtureError, FixtureResult, StoreError};
pub use inserter::{InsertReport, InsertionState};
pub use loader::{DatasetLoader, FixtureFormat};
pub use settings::FixtureSettings;
pub use store::{MemoryStore, StoreClient};

#[cfg(feature = "mongodb")]
pub use store::MongoStore;
