//! Dependency-ordered insertion.
//!
//! Collections are inserted in the order their references demand rather than
//! in declaration order. When a record refers to a collection that has not
//! been inserted yet, that collection is inserted first, recursively.
//!
//! Each collection moves through [`InsertionState`] exactly once:
//! `NotStarted -> InProgress -> Done`. Reaching a collection that is still
//! `InProgress` means the references form a cycle.

use std::collections::HashMap;

use serde_json::Value;

use crate::dataset::{Fields, FixtureDataset};
use crate::error::{FixtureError, FixtureResult};
use crate::resolver::{self, ReferenceContext};
use crate::store::StoreClient;

/// Insertion progress of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertionState {
	/// No record of the collection has been inserted.
	#[default]
	NotStarted,
	/// Records are being resolved and inserted.
	InProgress,
	/// Every record has been inserted.
	Done,
}

/// Insertion state of every collection touched by a push.
#[derive(Debug, Clone, Default)]
pub struct InsertionTracker {
	states: HashMap<String, InsertionState>,
}

impl InsertionTracker {
	/// Creates a tracker with every collection `NotStarted`.
	pub fn new() -> Self {
		Self::default()
	}

	/// Current state of a collection.
	pub fn state(&self, collection: &str) -> InsertionState {
		self.states.get(collection).copied().unwrap_or_default()
	}

	/// Moves every collection back to `NotStarted`.
	pub fn reset(&mut self) {
		self.states.clear();
	}

	fn set(&mut self, collection: &str, state: InsertionState) {
		tracing::debug!(collection = %collection, ?state, "collection state changed");
		self.states.insert(collection.to_string(), state);
	}
}

/// Summary of one insertion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
	/// Collections in the order they reached `Done`.
	pub collections: Vec<String>,
	/// Number of records written to the store.
	pub records_inserted: usize,
}

/// Inserts the collections of a dataset, resolving references on the way.
pub struct Inserter<'a> {
	dataset: &'a mut FixtureDataset,
	store: &'a dyn StoreClient,
	tracker: &'a mut InsertionTracker,
	stack: Vec<String>,
	report: InsertReport,
}

impl<'a> Inserter<'a> {
	/// Creates an inserter over a dataset, a store and the insertion states.
	pub fn new(
		dataset: &'a mut FixtureDataset,
		store: &'a dyn StoreClient,
		tracker: &'a mut InsertionTracker,
	) -> Self {
		Self {
			dataset,
			store,
			tracker,
			stack: Vec::new(),
			report: InsertReport::default(),
		}
	}

	/// Inserts every collection of the dataset.
	///
	/// Collections already `Done` are skipped.
	pub fn insert_all(mut self) -> FixtureResult<InsertReport> {
		let names: Vec<String> = self
			.dataset
			.collection_names()
			.into_iter()
			.map(str::to_string)
			.collect();

		for name in &names {
			self.insert_collection(name)?;
		}
		Ok(self.report)
	}

	/// Inserts one collection, and before it any collection it references.
	///
	/// # Errors
	///
	/// - [`FixtureError::CyclicReference`] if the collection is already being inserted.
	/// - [`FixtureError::NoSuchCollection`] if the dataset has no such collection.
	/// - Resolution and store errors, wrapped in [`FixtureError::Insertion`].
	pub fn insert_collection(&mut self, name: &str) -> FixtureResult<()> {
		match self.tracker.state(name) {
			InsertionState::Done => return Ok(()),
			InsertionState::InProgress => {
				let mut chain = self.stack.clone();
				chain.push(name.to_string());
				return Err(FixtureError::CyclicReference {
					collection: name.to_string(),
					chain,
				});
			}
			InsertionState::NotStarted => {}
		}

		let records: Vec<(String, Fields)> = self
			.dataset
			.lookup(name)?
			.iter()
			.map(|record| (record.key().to_string(), record.fields().clone()))
			.collect();

		self.tracker.set(name, InsertionState::InProgress);
		self.stack.push(name.to_string());
		let result = self.insert_records(name, &records);
		self.stack.pop();

		match result {
			Ok(()) => {
				self.tracker.set(name, InsertionState::Done);
				self.report.collections.push(name.to_string());
				Ok(())
			}
			Err(e) => {
				// A failed collection must be retried from scratch by the next push.
				self.tracker.set(name, InsertionState::NotStarted);
				self.dataset.lookup_mut(name)?.clear_identities();
				Err(e)
			}
		}
	}

	fn insert_records(&mut self, name: &str, records: &[(String, Fields)]) -> FixtureResult<()> {
		for (index, (key, fields)) in records.iter().enumerate() {
			let document = self.resolve_record(name, key, fields)?;
			let id = self
				.store
				.insert(name, document)
				.map_err(|e| FixtureError::from(e).at_record(name, key, None))?;

			tracing::debug!(collection = %name, record = %key, id = %id, "inserted fixture record");
			if let Some(record) = self.dataset.lookup_mut(name)?.get_index_mut(index) {
				record.set_identity(id);
			}
			self.report.records_inserted += 1;
		}
		Ok(())
	}

	fn resolve_record(
		&mut self,
		collection: &str,
		key: &str,
		fields: &Fields,
	) -> FixtureResult<Fields> {
		let mut document = Fields::new();
		for (field, value) in fields {
			let resolved = resolver::resolve(value, self)
				.map_err(|e| e.at_record(collection, key, Some(field)))?;
			document.insert(field.clone(), resolved);
		}
		Ok(document)
	}
}

impl ReferenceContext for Inserter<'_> {
	fn is_collection(&self, name: &str) -> bool {
		self.dataset.contains(name)
	}

	fn ensure_inserted(&mut self, collection: &str) -> FixtureResult<()> {
		self.insert_collection(collection)
	}

	fn identity_of(&self, collection: &str, key: &str) -> FixtureResult<Option<Value>> {
		self.dataset
			.lookup(collection)?
			.get(key)
			.map(|record| record.identity().cloned())
			.ok_or_else(|| FixtureError::UnknownRecordKey {
				collection: collection.to_string(),
				key: key.to_string(),
			})
	}
}
