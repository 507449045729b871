//! Fixture lifecycle: load, check, push, rollback.
//!
//! A [`FixtureContext`] owns one loaded fixture and one store connection.
//! Before anything is written it checks that every collection of the fixture
//! is empty in the store. The result of that check is remembered: once it
//! passed, the fixture and the connection are pinned and a later check
//! returns immediately.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reinhardt_doc_fixtures::prelude::*;
//!
//! # fn example() -> FixtureResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let settings = FixtureSettings::new().with_fixtures_root("tests/fixtures");
//! let mut fixture = FixtureContext::new(settings);
//! fixture.load("blog")?;
//! fixture.set_connection(store)?;
//! fixture.push()?;
//!
//! let pepe = fixture.lookup("users")?.get("pepe").unwrap();
//! println!("pepe was stored as {:?}", pepe.identity());
//!
//! fixture.rollback()?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::dataset::{Fields, FixtureDataset, RecordSet};
use crate::error::{FixtureError, FixtureResult};
use crate::inserter::{InsertReport, Inserter, InsertionState, InsertionTracker};
use crate::loader::DatasetLoader;
use crate::settings::FixtureSettings;
use crate::stash::Stash;
use crate::store::{ID_FIELD, StoreClient};

/// Owner of a loaded fixture and the store it is pushed into.
pub struct FixtureContext {
	settings: FixtureSettings,
	fixture: Option<String>,
	data: Option<FixtureDataset>,
	store: Option<Arc<dyn StoreClient>>,
	checked: bool,
	tracker: InsertionTracker,
}

impl std::fmt::Debug for FixtureContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FixtureContext")
			.field("settings", &self.settings)
			.field("fixture", &self.fixture)
			.field("data", &self.data)
			.field("has_store", &self.store.is_some())
			.field("checked", &self.checked)
			.finish()
	}
}

impl FixtureContext {
	/// Creates a context with nothing loaded and no connection.
	pub fn new(settings: FixtureSettings) -> Self {
		Self {
			settings,
			fixture: None,
			data: None,
			store: None,
			checked: false,
			tracker: InsertionTracker::new(),
		}
	}

	/// Loads `fixture`, sets the connection and pushes.
	pub fn open(
		settings: FixtureSettings,
		fixture: &str,
		store: Arc<dyn StoreClient>,
	) -> FixtureResult<Self> {
		let mut context = Self::open_without_push(settings, fixture, store)?;
		context.push()?;
		Ok(context)
	}

	/// Loads `fixture` and sets the connection without touching the store.
	pub fn open_without_push(
		settings: FixtureSettings,
		fixture: &str,
		store: Arc<dyn StoreClient>,
	) -> FixtureResult<Self> {
		let mut context = Self::new(settings);
		context.load(fixture)?;
		context.set_connection(store)?;
		Ok(context)
	}

	/// Loads the named fixture from the fixtures root.
	///
	/// Collections of the fixture are added to those already loaded.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::LoadingFixtureIllegal`] if the check already ran,
	/// or any loader error.
	pub fn load(&mut self, fixture: &str) -> FixtureResult<()> {
		if self.checked {
			return Err(FixtureError::LoadingFixtureIllegal);
		}
		let dataset = DatasetLoader::from_settings(&self.settings).load(fixture)?;
		self.merge(fixture, dataset);
		Ok(())
	}

	/// Loads an in-memory dataset under the given fixture name.
	///
	/// Same rules as [`load`](Self::load).
	pub fn load_dataset(&mut self, fixture: &str, dataset: FixtureDataset) -> FixtureResult<()> {
		if self.checked {
			return Err(FixtureError::LoadingFixtureIllegal);
		}
		self.merge(fixture, dataset);
		Ok(())
	}

	fn merge(&mut self, fixture: &str, dataset: FixtureDataset) {
		let data = self.data.get_or_insert_with(FixtureDataset::new);
		for (name, records) in dataset.iter() {
			data.insert(name, records.clone());
		}
		self.fixture = Some(fixture.to_string());
	}

	/// Sets the store connection.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ChangingConnectionIllegal`] if the check already ran.
	pub fn set_connection(&mut self, store: Arc<dyn StoreClient>) -> FixtureResult<()> {
		if self.checked {
			return Err(FixtureError::ChangingConnectionIllegal);
		}
		self.store = Some(store);
		Ok(())
	}

	/// Verifies that every collection of the fixture is empty in the store.
	///
	/// Returns `Ok(true)` on success. Once passed, later calls return
	/// `Ok(true)` without querying the store.
	///
	/// # Errors
	///
	/// - [`FixtureError::MissingFixture`] if nothing was loaded.
	/// - [`FixtureError::MissingConnection`] if no connection was set.
	/// - [`FixtureError::CollectionsNotEmpty`] naming the first non-empty
	///   collection, in declaration order.
	pub fn check(&mut self) -> FixtureResult<bool> {
		if self.checked {
			return Ok(true);
		}

		let data = self.data.as_ref().ok_or(FixtureError::MissingFixture)?;
		let store = self.store.as_ref().ok_or(FixtureError::MissingConnection)?;

		for name in data.collection_names() {
			if store.count(name)? != 0 {
				return Err(FixtureError::CollectionsNotEmpty(name.to_string()));
			}
		}

		tracing::debug!(collections = data.len(), "fixture collections are empty");
		self.checked = true;
		Ok(true)
	}

	/// Marks the context as checked without querying the store.
	///
	/// Rollback will then drop the collections even if they held data before
	/// the push.
	pub fn force_checked(&mut self) {
		tracing::warn!(fixture = ?self.fixture, "fixture check forced");
		self.checked = true;
	}

	/// Inserts the fixture into the store.
	///
	/// Collections are inserted in the order their references require.
	/// Collections already inserted by an earlier push are skipped.
	///
	/// # Errors
	///
	/// Any [`check`](Self::check) error is returned as is. A resolution or
	/// store error triggers a [`rollback`](Self::rollback) and is then
	/// returned with the failing record's location, whether or not the
	/// rollback succeeded. A failed rollback is logged.
	pub fn push(&mut self) -> FixtureResult<InsertReport> {
		self.check()?;

		let data = self.data.as_mut().ok_or(FixtureError::MissingFixture)?;
		let store = self.store.as_ref().ok_or(FixtureError::MissingConnection)?;

		match Inserter::new(data, store.as_ref(), &mut self.tracker).insert_all() {
			Ok(report) => {
				tracing::info!(
					fixture = ?self.fixture,
					records = report.records_inserted,
					order = ?report.collections,
					"pushed fixture"
				);
				Ok(report)
			}
			Err(error) => {
				tracing::warn!(
					fixture = ?self.fixture,
					%error,
					"fixture push failed, rolling back"
				);
				// The check above is memoized, so the rollback can only fail in the store.
				if let Err(rollback_error) = self.rollback() {
					tracing::error!(
						%error,
						%rollback_error,
						"rollback failed after failed push"
					);
				}
				Err(error)
			}
		}
	}

	/// Drops every collection of the fixture.
	///
	/// Only allowed when the collections were confirmed empty before the
	/// push; an unchecked context runs the check first.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::RollbackIllegal`] if the check finds a
	/// non-empty collection, any other check error, or a store error.
	pub fn rollback(&mut self) -> FixtureResult<()> {
		match self.check() {
			Ok(_) => {}
			Err(FixtureError::CollectionsNotEmpty(collection)) => {
				tracing::error!(collection = %collection, "refusing to roll back live data");
				return Err(FixtureError::RollbackIllegal { cause: None });
			}
			Err(e) => return Err(e),
		}

		let data = self.data.as_mut().ok_or(FixtureError::MissingFixture)?;
		let store = self.store.as_ref().ok_or(FixtureError::MissingConnection)?;

		for name in data.collection_names() {
			store.drop_collection(name)?;
		}
		data.clear_identities();
		self.tracker.reset();

		tracing::info!(fixture = ?self.fixture, collections = data.len(), "rolled back fixture");
		Ok(())
	}

	/// Returns the records of a collection of the loaded fixture.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::NoSuchCollection`] if there is no such collection.
	pub fn lookup(&self, name: &str) -> FixtureResult<&RecordSet> {
		match &self.data {
			Some(data) => data.lookup(name),
			None => Err(FixtureError::NoSuchCollection(name.to_string())),
		}
	}

	/// Fetches the stored document of a pushed record.
	///
	/// Returns `Ok(None)` if the record has not been inserted.
	pub fn stored(&self, collection: &str, key: &str) -> FixtureResult<Option<Fields>> {
		let record = self
			.lookup(collection)?
			.get(key)
			.ok_or_else(|| FixtureError::UnknownRecordKey {
				collection: collection.to_string(),
				key: key.to_string(),
			})?;
		let Some(id) = record.identity() else {
			return Ok(None);
		};
		let store = self.store.as_ref().ok_or(FixtureError::MissingConnection)?;
		Ok(store.find_one(collection, ID_FIELD, id)?)
	}

	/// Appends the loaded fixture name to the stash file.
	pub fn stash(&self) -> FixtureResult<()> {
		let fixture = self.fixture.as_deref().ok_or(FixtureError::MissingFixture)?;
		Stash::new(self.settings.stash_path()).append(fixture)
	}

	/// Fixture names stashed so far under the given settings, oldest first.
	pub fn stashed(settings: &FixtureSettings) -> FixtureResult<Vec<String>> {
		Stash::new(settings.stash_path()).entries()
	}

	/// Insertion state of a collection.
	pub fn insertion_state(&self, collection: &str) -> InsertionState {
		self.tracker.state(collection)
	}

	/// Returns true once the emptiness check has passed or was forced.
	pub fn is_checked(&self) -> bool {
		self.checked
	}

	/// The loaded dataset, if any.
	pub fn data(&self) -> Option<&FixtureDataset> {
		self.data.as_ref()
	}

	/// The store connection, if any.
	pub fn store(&self) -> Option<&Arc<dyn StoreClient>> {
		self.store.as_ref()
	}

	/// Name of the most recently loaded fixture.
	pub fn fixture_name(&self) -> Option<&str> {
		self.fixture.as_deref()
	}

	/// Settings of this context.
	pub fn settings(&self) -> &FixtureSettings {
		&self.settings
	}

	/// Directory fixtures are loaded from.
	pub fn fixtures_path(&self) -> &Path {
		&self.settings.fixtures_root
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::StoreError;
	use mockall::{Sequence, mock};
	use rstest::rstest;
	use serde_json::{Value, json};
	use std::sync::atomic::{AtomicUsize, Ordering};

	mock! {
		pub Store {}

		impl StoreClient for Store {
			fn count(&self, collection: &str) -> Result<u64, StoreError>;
			fn insert(&self, collection: &str, document: Fields) -> Result<Value, StoreError>;
			fn find_one(
				&self,
				collection: &str,
				field: &str,
				value: &Value,
			) -> Result<Option<Fields>, StoreError>;
			fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;
		}
	}

	fn context_with(data: Value, store: MockStore) -> FixtureContext {
		let mut context = FixtureContext::new(FixtureSettings::new());
		context
			.load_dataset("test", FixtureDataset::from_value(data).unwrap())
			.unwrap();
		context.set_connection(Arc::new(store)).unwrap();
		context
	}

	fn doc(value: Value) -> Fields {
		value.as_object().cloned().unwrap()
	}

	#[rstest]
	fn test_check_counts_every_collection() {
		let mut store = MockStore::new();
		store
			.expect_count()
			.withf(|collection| collection == "users")
			.times(1)
			.returning(|_| Ok(0));
		store
			.expect_count()
			.withf(|collection| collection == "actions")
			.times(1)
			.returning(|_| Ok(0));

		let mut context = context_with(json!({ "users": {}, "actions": {} }), store);

		assert!(context.check().unwrap());
		assert!(context.is_checked());
	}

	#[rstest]
	fn test_check_is_idempotent() {
		let mut store = MockStore::new();
		store.expect_count().times(2).returning(|_| Ok(0));

		let mut context = context_with(json!({ "users": {}, "actions": {} }), store);

		assert!(context.check().unwrap());
		assert!(context.check().unwrap());
	}

	#[rstest]
	fn test_check_passed_stays_passed() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let mut store = MockStore::new();
		store.expect_count().returning(move |_| {
			let call = counter.fetch_add(1, Ordering::SeqCst);
			Ok(if call < 4 { 0 } else { 10 })
		});

		let mut context = context_with(
			json!({ "users": {}, "tables": {}, "actions": {}, "schemas": {} }),
			store,
		);

		assert!(context.check().unwrap());
		assert!(context.check().unwrap());
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[rstest]
	fn test_check_non_empty_collection() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(4));

		let mut context = context_with(json!({ "users": {} }), store);

		let error = context.check().unwrap_err();
		assert!(matches!(error, FixtureError::CollectionsNotEmpty(ref name) if name == "users"));
		assert_eq!(
			error.to_string(),
			"The collection 'users' is not empty, all collections should be empty prior to testing"
		);
		assert!(!context.is_checked());
	}

	#[rstest]
	fn test_check_without_fixture() {
		let mut context = FixtureContext::new(FixtureSettings::new());
		context.set_connection(Arc::new(MockStore::new())).unwrap();

		let error = context.check().unwrap_err();
		assert_eq!(error.to_string(), "No fixture has been loaded, nothing to check");
	}

	#[rstest]
	fn test_check_without_connection() {
		let mut context = FixtureContext::new(FixtureSettings::new());
		context
			.load_dataset("test", FixtureDataset::from_value(json!({ "users": {} })).unwrap())
			.unwrap();

		let error = context.check().unwrap_err();
		assert_eq!(
			error.to_string(),
			"No connection has been provided, impossible to check"
		);
	}

	#[rstest]
	fn test_load_after_check_is_illegal() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		let mut context = context_with(json!({ "users": {} }), store);
		context.check().unwrap();

		let error = context
			.load_dataset("another", FixtureDataset::new())
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"A check has already been made, loading a different fixture is illegal"
		);
		assert!(matches!(
			context.load("another"),
			Err(FixtureError::LoadingFixtureIllegal)
		));
	}

	#[rstest]
	fn test_changing_connection_after_check_is_illegal() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		let mut context = context_with(json!({ "users": {} }), store);
		context.check().unwrap();

		let error = context
			.set_connection(Arc::new(MockStore::new()))
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"A check has already been performed, changing the connection now is illegal"
		);
	}

	#[rstest]
	fn test_push_inserts_every_record() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store
			.expect_insert()
			.withf(|collection, document| {
				collection == "users"
					&& *document == doc(json!({ "name": "John", "last_name": "Wayne" }))
			})
			.times(1)
			.returning(|_, _| Ok(json!(1)));
		store
			.expect_insert()
			.withf(|collection, document| {
				collection == "actions"
					&& *document == doc(json!({ "user_id": 1, "action": "Walks" }))
			})
			.times(1)
			.returning(|_, _| Ok(json!(2)));

		let mut context = context_with(
			json!({
				"users": { "john": { "name": "John", "last_name": "Wayne" } },
				"actions": { "walk": { "user_id": 1, "action": "Walks" } }
			}),
			store,
		);

		let report = context.push().unwrap();
		assert_eq!(report.records_inserted, 2);
		assert_eq!(context.insertion_state("users"), InsertionState::Done);
	}

	#[rstest]
	fn test_push_empty_dataset() {
		let mut store = MockStore::new();
		store.expect_insert().times(0);

		let mut context = context_with(json!({}), store);

		let report = context.push().unwrap();
		assert_eq!(report.records_inserted, 0);
	}

	#[rstest]
	fn test_push_inserts_processed_value() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store
			.expect_insert()
			.withf(|_, document| *document == doc(json!({ "password": "35ferwt352" })))
			.times(1)
			.returning(|_, _| Ok(json!("id")));

		let mut context = context_with(
			json!({
				"users": { "user": { "password": { "raw": "secret", "processed": "35ferwt352" } } }
			}),
			store,
		);

		context.push().unwrap();
	}

	#[rstest]
	fn test_push_resolves_reference_out_of_order() {
		let mut seq = Sequence::new();
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store
			.expect_insert()
			.withf(|collection, _| collection == "users")
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(json!("un id")));
		store
			.expect_insert()
			.withf(|collection, document| {
				collection == "comments"
					&& *document == doc(json!({ "user": "un id", "text": "FLAME" }))
			})
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(json!("comment id")));

		let mut context = context_with(
			json!({
				"comments": { "flamewar": { "user": { "users": "pepe" }, "text": "FLAME" } },
				"users": { "pepe": { "name": "Jonah" } }
			}),
			store,
		);

		context.push().unwrap();
		let pepe = context.lookup("users").unwrap().get("pepe").unwrap();
		assert_eq!(pepe.identity(), Some(&json!("un id")));
	}

	#[rstest]
	fn test_push_failure_rolls_back() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store.expect_insert().times(0);
		store
			.expect_drop_collection()
			.withf(|collection| collection == "users")
			.times(1)
			.returning(|_| Ok(()));

		let mut context = context_with(
			json!({ "users": { "hey": { "pass": { "raw": "There" } } } }),
			store,
		);

		let error = context.push().unwrap_err();
		assert_eq!(
			error.root_cause().to_string(),
			"This fixture does not include data for the collections [raw]"
		);
		assert!(matches!(
			error,
			FixtureError::Insertion { ref record, ref field, .. }
				if record == "hey" && field.as_deref() == Some("pass")
		));
		assert_eq!(context.insertion_state("users"), InsertionState::NotStarted);
	}

	#[rstest]
	fn test_push_store_error_rolls_back() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store
			.expect_insert()
			.returning(|_, _| Err(StoreError::Execution("write refused".to_string())));
		store.expect_drop_collection().times(1).returning(|_| Ok(()));

		let mut context = context_with(json!({ "users": { "john": {} } }), store);

		let error = context.push().unwrap_err();
		assert!(matches!(
			error.root_cause(),
			FixtureError::Store(StoreError::Execution(_))
		));
	}

	#[rstest]
	fn test_push_after_failed_rollback_retries_cleanly() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store.expect_insert().times(0);
		store
			.expect_drop_collection()
			.returning(|_| Err(StoreError::Connection("connection reset".to_string())));

		let mut context = context_with(
			json!({
				"comments": { "c": { "user": { "users": "u" } } },
				"users": { "u": { "p": { "raw": "x" } } }
			}),
			store,
		);

		let first = context.push().unwrap_err();
		assert!(matches!(
			first.root_cause(),
			FixtureError::ReferencedRecordNotFound(_)
		));
		assert_eq!(context.insertion_state("comments"), InsertionState::NotStarted);
		assert_eq!(context.insertion_state("users"), InsertionState::NotStarted);

		let second = context.push().unwrap_err();
		assert!(matches!(
			second.root_cause(),
			FixtureError::ReferencedRecordNotFound(_)
		));
		assert_eq!(second.to_string(), first.to_string());
	}

	#[rstest]
	fn test_push_does_not_roll_back_when_check_fails() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(1));
		store.expect_drop_collection().times(0);

		let mut context = context_with(json!({ "users": { "john": {} } }), store);

		assert!(matches!(
			context.push(),
			Err(FixtureError::CollectionsNotEmpty(_))
		));
	}

	#[rstest]
	fn test_rollback_drops_every_collection() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store.expect_drop_collection().times(3).returning(|_| Ok(()));

		let mut context = context_with(json!({ "users": {}, "actions": {}, "extras": {} }), store);
		assert!(context.check().unwrap());

		context.rollback().unwrap();
	}

	#[rstest]
	fn test_rollback_refuses_live_data() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(3));
		store.expect_drop_collection().times(0);

		let mut context = context_with(json!({ "users": {} }), store);

		let error = context.rollback().unwrap_err();
		assert_eq!(
			error.to_string(),
			"The collections weren't empty to begin with, rollback aborted."
		);
	}

	#[rstest]
	fn test_force_checked_skips_count() {
		let mut store = MockStore::new();
		store.expect_count().times(0);
		store.expect_drop_collection().times(1).returning(|_| Ok(()));

		let mut context = context_with(json!({ "users": {} }), store);
		context.force_checked();

		assert!(context.check().unwrap());
		context.rollback().unwrap();
	}

	#[rstest]
	fn test_lookup() {
		let context = context_with(
			json!({ "users": { "john": { "name": "John", "last_name": "Wayne" } } }),
			MockStore::new(),
		);

		let john = context.lookup("users").unwrap().get("john").unwrap();
		assert_eq!(john.field("name"), Some(&json!("John")));
		assert!(matches!(
			context.lookup("nothing"),
			Err(FixtureError::NoSuchCollection(ref name)) if name == "nothing"
		));
		assert!(matches!(
			FixtureContext::new(FixtureSettings::new()).lookup("users"),
			Err(FixtureError::NoSuchCollection(_))
		));
	}

	#[rstest]
	fn test_stored_uses_find_one() {
		let mut store = MockStore::new();
		store.expect_count().returning(|_| Ok(0));
		store.expect_insert().returning(|_, _| Ok(json!("id-1")));
		store
			.expect_find_one()
			.withf(|collection, field, value| {
				collection == "users" && field == "_id" && *value == json!("id-1")
			})
			.times(1)
			.returning(|_, _, _| Ok(Some(doc(json!({ "_id": "id-1", "name": "John" })))));

		let mut context = context_with(json!({ "users": { "john": { "name": "John" } } }), store);
		assert!(context.stored("users", "john").unwrap().is_none());
		context.push().unwrap();

		let stored = context.stored("users", "john").unwrap().unwrap();
		assert_eq!(stored["name"], json!("John"));
	}
}
