//! Document store clients.
//!
//! The fixture engine talks to the store only through [`StoreClient`]. All
//! calls are blocking; a push never runs two store operations at once.
//!
//! - [`MemoryStore`] keeps documents in process memory.
//! - [`MongoStore`] (feature `mongodb`) drives a MongoDB deployment through
//!   the driver's blocking API.

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::{MongoStore, MongoStoreBuilder};

use serde_json::Value;

use crate::dataset::Fields;
use crate::error::StoreError;

/// Name of the identifier field written by every store client.
pub const ID_FIELD: &str = "_id";

/// Minimal document store contract required by the fixture engine.
///
/// Every method is scoped to one collection by name.
///
/// # Example
///
/// ```
/// use reinhardt_doc_fixtures::store::{MemoryStore, StoreClient};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// let id = store
///     .insert("users", json!({ "name": "John" }).as_object().unwrap().clone())
///     .unwrap();
///
/// assert_eq!(store.count("users").unwrap(), 1);
/// let found = store.find_one("users", "_id", &id).unwrap().unwrap();
/// assert_eq!(found["name"], json!("John"));
/// ```
pub trait StoreClient: Send + Sync {
	/// Number of documents in the collection. Unknown collections count as empty.
	fn count(&self, collection: &str) -> Result<u64, StoreError>;

	/// Inserts one document and returns the identifier the store assigned to it.
	fn insert(&self, collection: &str, document: Fields) -> Result<Value, StoreError>;

	/// Returns the first document whose `field` equals `value`.
	fn find_one(
		&self,
		collection: &str,
		field: &str,
		value: &Value,
	) -> Result<Option<Fields>, StoreError>;

	/// Drops the collection and every document in it.
	fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;
}
