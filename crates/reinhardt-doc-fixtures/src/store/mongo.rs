//! MongoDB store client.
//!
//! Uses the driver's blocking API so that every store call of a push
//! completes before the next one starts.
//!
//! Identifiers assigned by MongoDB are `ObjectId`s. They are surfaced to the
//! fixture engine as `{"$oid": "<hex>"}` and turned back into real
//! `ObjectId`s when a referencing document is written.
//!
//! # Example
//!
//! ```rust,no_run
//! use reinhardt_doc_fixtures::store::MongoStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MongoStore::builder()
//!     .url("mongodb://localhost:27017")
//!     .database("app_test")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use bson::{Bson, Document};
use mongodb::sync::{Client, Collection};
use serde_json::Value;

use super::StoreClient;
use crate::dataset::Fields;
use crate::error::StoreError;

/// Builder for [`MongoStore`].
#[derive(Debug, Clone)]
pub struct MongoStoreBuilder {
	url: String,
	database: String,
}

impl Default for MongoStoreBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl MongoStoreBuilder {
	/// Creates a builder pointing at `mongodb://localhost:27017`, database `test`.
	pub fn new() -> Self {
		Self {
			url: "mongodb://localhost:27017".to_string(),
			database: "test".to_string(),
		}
	}

	/// Sets the connection string.
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	/// Sets the database holding the fixture collections.
	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = database.into();
		self
	}

	/// Connects to the deployment.
	pub fn build(self) -> Result<MongoStore, StoreError> {
		let client = Client::with_uri_str(&self.url)
			.map_err(|e| StoreError::Connection(e.to_string()))?;

		Ok(MongoStore {
			client,
			database_name: self.database,
		})
	}
}

/// [`StoreClient`] backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
	client: Client,
	database_name: String,
}

impl std::fmt::Debug for MongoStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MongoStore")
			.field("database_name", &self.database_name)
			.finish_non_exhaustive()
	}
}

impl MongoStore {
	/// Creates a builder for configuring the connection.
	pub fn builder() -> MongoStoreBuilder {
		MongoStoreBuilder::new()
	}

	/// Connects with a connection string and database name.
	pub fn connect(url: &str, database: &str) -> Result<Self, StoreError> {
		Self::builder().url(url).database(database).build()
	}

	/// Name of the database in use.
	pub fn database_name(&self) -> &str {
		&self.database_name
	}

	fn collection(&self, name: &str) -> Collection<Document> {
		self.client
			.database(&self.database_name)
			.collection::<Document>(name)
	}
}

impl StoreClient for MongoStore {
	fn count(&self, collection: &str) -> Result<u64, StoreError> {
		Ok(self.collection(collection).count_documents(Document::new()).run()?)
	}

	fn insert(&self, collection: &str, document: Fields) -> Result<Value, StoreError> {
		let document = to_document(&document)?;
		let result = self.collection(collection).insert_one(document).run()?;
		from_bson(result.inserted_id)
	}

	fn find_one(
		&self,
		collection: &str,
		field: &str,
		value: &Value,
	) -> Result<Option<Fields>, StoreError> {
		let mut filter = Document::new();
		filter.insert(field, to_bson(value)?);

		self.collection(collection)
			.find_one(filter)
			.run()?
			.map(from_document)
			.transpose()
	}

	fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
		self.collection(collection).drop().run()?;
		Ok(())
	}
}

fn to_document(fields: &Fields) -> Result<Document, StoreError> {
	match to_bson(&Value::Object(fields.clone()))? {
		Bson::Document(document) => Ok(document),
		other => Err(StoreError::Serialization(format!(
			"expected a document, got {other}"
		))),
	}
}

fn to_bson(value: &Value) -> Result<Bson, StoreError> {
	Bson::try_from(value.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_document(document: Document) -> Result<Fields, StoreError> {
	match from_bson(Bson::Document(document))? {
		Value::Object(fields) => Ok(fields),
		other => Err(StoreError::Serialization(format!(
			"expected an object, got {other}"
		))),
	}
}

fn from_bson(value: Bson) -> Result<Value, StoreError> {
	ensure_finite(&value)?;
	Ok(value.into_relaxed_extjson())
}

fn ensure_finite(value: &Bson) -> Result<(), StoreError> {
	match value {
		Bson::Double(f) if !f.is_finite() => Err(StoreError::Serialization(format!(
			"number {f} cannot be represented in JSON"
		))),
		Bson::Array(items) => items.iter().try_for_each(ensure_finite),
		Bson::Document(document) => document.values().try_for_each(ensure_finite),
		_ => Ok(()),
	}
}
