//! In-process document store.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use super::{ID_FIELD, StoreClient};
use crate::dataset::Fields;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
	collections: IndexMap<String, Vec<Fields>>,
	inserts: Vec<String>,
}

/// Document store kept entirely in memory.
///
/// Documents without an `_id` field receive a random UUID (v4) string as
/// identifier. The store also remembers which collection every insert went
/// to, in order, which makes insertion order observable in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
	state: Mutex<MemoryState>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of every document in the collection, in insertion order.
	pub fn documents(&self, collection: &str) -> Vec<Fields> {
		self.state
			.lock()
			.collections
			.get(collection)
			.cloned()
			.unwrap_or_default()
	}

	/// Collection names of all inserts performed so far, in order.
	pub fn insert_log(&self) -> Vec<String> {
		self.state.lock().inserts.clone()
	}

	/// Names of the collections that currently exist.
	pub fn collection_names(&self) -> Vec<String> {
		self.state.lock().collections.keys().cloned().collect()
	}
}

impl StoreClient for MemoryStore {
	fn count(&self, collection: &str) -> Result<u64, StoreError> {
		let state = self.state.lock();
		Ok(state
			.collections
			.get(collection)
			.map_or(0, |documents| documents.len() as u64))
	}

	fn insert(&self, collection: &str, mut document: Fields) -> Result<Value, StoreError> {
		let id = match document.get(ID_FIELD) {
			Some(id) => id.clone(),
			None => {
				let id = Value::String(Uuid::new_v4().to_string());
				document.insert(ID_FIELD.to_string(), id.clone());
				id
			}
		};

		let mut state = self.state.lock();
		let documents = state.collections.entry(collection.to_string()).or_default();
		if documents.iter().any(|doc| doc.get(ID_FIELD) == Some(&id)) {
			return Err(StoreError::Execution(format!(
				"duplicate key in collection '{collection}': {id}"
			)));
		}
		documents.push(document);
		state.inserts.push(collection.to_string());
		Ok(id)
	}

	fn find_one(
		&self,
		collection: &str,
		field: &str,
		value: &Value,
	) -> Result<Option<Fields>, StoreError> {
		let state = self.state.lock();
		Ok(state.collections.get(collection).and_then(|documents| {
			documents
				.iter()
				.find(|doc| doc.get(field) == Some(value))
				.cloned()
		}))
	}

	fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
		self.state.lock().collections.shift_remove(collection);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn doc(value: Value) -> Fields {
		value.as_object().cloned().unwrap()
	}

	#[fixture]
	fn store() -> MemoryStore {
		MemoryStore::new()
	}

	#[rstest]
	fn test_count_unknown_collection(store: MemoryStore) {
		assert_eq!(store.count("users").unwrap(), 0);
	}

	#[rstest]
	fn test_insert_assigns_identifier(store: MemoryStore) {
		let id = store.insert("users", doc(json!({ "name": "John" }))).unwrap();

		assert!(Uuid::parse_str(id.as_str().unwrap()).is_ok());
		let stored = store.documents("users");
		assert_eq!(stored.len(), 1);
		assert_eq!(stored[0][ID_FIELD], id);
	}

	#[rstest]
	fn test_insert_keeps_explicit_identifier(store: MemoryStore) {
		let id = store
			.insert("users", doc(json!({ "_id": 7, "name": "John" })))
			.unwrap();
		assert_eq!(id, json!(7));

		let duplicate = store.insert("users", doc(json!({ "_id": 7 })));
		assert!(matches!(duplicate, Err(StoreError::Execution(_))));
		assert_eq!(store.count("users").unwrap(), 1);
	}

	#[rstest]
	fn test_find_one(store: MemoryStore) {
		store.insert("users", doc(json!({ "name": "John" }))).unwrap();
		store.insert("users", doc(json!({ "name": "Jane" }))).unwrap();

		let jane = store.find_one("users", "name", &json!("Jane")).unwrap();
		assert_eq!(jane.unwrap()["name"], json!("Jane"));
		assert!(store.find_one("users", "name", &json!("Joe")).unwrap().is_none());
		assert!(store.find_one("others", "name", &json!("Jane")).unwrap().is_none());
	}

	#[rstest]
	fn test_drop_collection(store: MemoryStore) {
		store.insert("users", doc(json!({}))).unwrap();
		store.insert("actions", doc(json!({}))).unwrap();

		store.drop_collection("users").unwrap();

		assert_eq!(store.count("users").unwrap(), 0);
		assert_eq!(store.collection_names(), vec!["actions".to_string()]);
		assert_eq!(
			store.insert_log(),
			vec!["users".to_string(), "actions".to_string()]
		);
	}
}
