//! In-memory fixture data model.
//!
//! A [`FixtureDataset`] maps collection names to [`RecordSet`]s, and a
//! [`RecordSet`] maps record keys to [`Record`]s. Both preserve declaration
//! order. Field values are kept as unresolved JSON values; resolution happens
//! at insertion time (see [`resolver`](crate::resolver)).
//!
//! # Example
//!
//! ```
//! # use reinhardt_doc_fixtures::FixtureDataset;
//! # use serde_json::json;
//! let dataset = FixtureDataset::from_value(json!({
//!     "users": { "pepe": { "name": "Jonah" } },
//!     "comments": { "flamewar": { "user": { "users": "pepe" }, "text": "FLAME" } }
//! }))
//! .unwrap();
//!
//! assert_eq!(dataset.collection_names(), vec!["users", "comments"]);
//! assert_eq!(dataset.lookup("users").unwrap().len(), 1);
//! ```

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{FixtureError, FixtureResult};

/// Field mapping of one record.
pub type Fields = Map<String, Value>;

/// One named entry of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
	key: String,
	fields: Fields,
	identity: Option<Value>,
}

impl Record {
	/// Creates a record that has not been inserted yet.
	pub fn new(key: impl Into<String>, fields: Fields) -> Self {
		Self {
			key: key.into(),
			fields,
			identity: None,
		}
	}

	/// Record key inside its collection.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Unresolved field values, in declaration order.
	pub fn fields(&self) -> &Fields {
		&self.fields
	}

	/// Returns one unresolved field value.
	pub fn field(&self, name: &str) -> Option<&Value> {
		self.fields.get(name)
	}

	/// Identifier assigned by the store, once inserted.
	pub fn identity(&self) -> Option<&Value> {
		self.identity.as_ref()
	}

	/// Returns true if the record was inserted in the current push.
	pub fn is_inserted(&self) -> bool {
		self.identity.is_some()
	}

	pub(crate) fn set_identity(&mut self, identity: Value) {
		self.identity = Some(identity);
	}

	pub(crate) fn clear_identity(&mut self) {
		self.identity = None;
	}
}

/// Ordered records of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
	records: IndexMap<String, Record>,
}

impl RecordSet {
	/// Creates an empty record set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a record set from a mapping of record key to field mapping.
	pub fn from_value(collection: &str, value: Value) -> FixtureResult<Self> {
		let Value::Object(entries) = value else {
			return Err(FixtureError::InvalidFixture(format!(
				"collection '{collection}' must be a mapping of record keys to fields"
			)));
		};

		let mut set = Self::new();
		for (key, fields) in entries {
			match fields {
				Value::Object(fields) => set.push(Record::new(key, fields)),
				_ => {
					return Err(FixtureError::InvalidFixture(format!(
						"record '{key}' in collection '{collection}' must be a mapping of fields"
					)));
				}
			}
		}
		Ok(set)
	}

	/// Appends a record, replacing any record with the same key in place.
	pub fn push(&mut self, record: Record) {
		self.records.insert(record.key.clone(), record);
	}

	/// Returns the record stored under `key`.
	pub fn get(&self, key: &str) -> Option<&Record> {
		self.records.get(key)
	}

	pub(crate) fn get_index_mut(&mut self, index: usize) -> Option<&mut Record> {
		self.records.get_index_mut(index).map(|(_, record)| record)
	}

	/// Record keys in declaration order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.records.keys().map(String::as_str)
	}

	/// Records in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = &Record> {
		self.records.values()
	}

	/// Returns the number of records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if there are no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub(crate) fn clear_identities(&mut self) {
		for record in self.records.values_mut() {
			record.clear_identity();
		}
	}
}

impl<'a> IntoIterator for &'a RecordSet {
	type Item = &'a Record;
	type IntoIter = indexmap::map::Values<'a, String, Record>;

	fn into_iter(self) -> Self::IntoIter {
		self.records.values()
	}
}

/// All collections of a loaded fixture, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureDataset {
	collections: IndexMap<String, RecordSet>,
}

impl FixtureDataset {
	/// Creates an empty dataset.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a dataset from `{collection: {record: {field: value}}}`.
	pub fn from_value(value: Value) -> FixtureResult<Self> {
		let Value::Object(collections) = value else {
			return Err(FixtureError::InvalidFixture(
				"dataset must be a mapping of collection names".to_string(),
			));
		};

		let mut dataset = Self::new();
		for (name, records) in collections {
			let set = RecordSet::from_value(&name, records)?;
			dataset.insert(name, set);
		}
		Ok(dataset)
	}

	/// Adds or replaces a collection. A new collection goes last.
	pub fn insert(&mut self, name: impl Into<String>, records: RecordSet) {
		self.collections.insert(name.into(), records);
	}

	/// Returns the records of a collection.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::NoSuchCollection`] if the dataset has no such collection.
	pub fn lookup(&self, name: &str) -> FixtureResult<&RecordSet> {
		self.collections
			.get(name)
			.ok_or_else(|| FixtureError::NoSuchCollection(name.to_string()))
	}

	pub(crate) fn lookup_mut(&mut self, name: &str) -> FixtureResult<&mut RecordSet> {
		self.collections
			.get_mut(name)
			.ok_or_else(|| FixtureError::NoSuchCollection(name.to_string()))
	}

	/// Returns true if the dataset holds a collection with this name.
	pub fn contains(&self, name: &str) -> bool {
		self.collections.contains_key(name)
	}

	/// Collection names in declaration order.
	pub fn collection_names(&self) -> Vec<&str> {
		self.collections.keys().map(String::as_str).collect()
	}

	/// Collections in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordSet)> {
		self.collections
			.iter()
			.map(|(name, records)| (name.as_str(), records))
	}

	/// Returns the number of collections.
	pub fn len(&self) -> usize {
		self.collections.len()
	}

	/// Returns true if the dataset has no collections.
	pub fn is_empty(&self) -> bool {
		self.collections.is_empty()
	}

	/// Total number of records across collections.
	pub fn record_count(&self) -> usize {
		self.collections.values().map(RecordSet::len).sum()
	}

	pub(crate) fn clear_identities(&mut self) {
		for records in self.collections.values_mut() {
			records.clear_identities();
		}
	}
}
