//! Error types for fixture loading and insertion.
//!
//! Every public operation of this crate reports failures through
//! [`FixtureError`]. Store clients report their own failures through
//! [`StoreError`], which converts into [`FixtureError::Store`] unchanged.

use thiserror::Error;

/// Errors raised by a [`StoreClient`](crate::store::StoreClient) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The store could not be reached.
	#[error("Connection error: {0}")]
	Connection(String),

	/// A store operation was rejected or failed while running.
	#[error("Execution error: {0}")]
	Execution(String),

	/// A document could not be converted to or from the store representation.
	#[error("Serialization error: {0}")]
	Serialization(String),
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StoreError {
	fn from(err: mongodb::error::Error) -> Self {
		use mongodb::error::ErrorKind;

		match *err.kind {
			ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
				StoreError::Connection(err.to_string())
			}
			_ => StoreError::Execution(err.to_string()),
		}
	}
}

/// Errors that can occur while loading, checking, pushing or rolling back a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
	/// A fixture was loaded after the emptiness check already ran.
	#[error("A check has already been made, loading a different fixture is illegal")]
	LoadingFixtureIllegal,

	/// The connection was replaced after the emptiness check already ran.
	#[error("A check has already been performed, changing the connection now is illegal")]
	ChangingConnectionIllegal,

	/// No fixture has been loaded.
	#[error("No fixture has been loaded, nothing to check")]
	MissingFixture,

	/// No store connection has been provided.
	#[error("No connection has been provided, impossible to check")]
	MissingConnection,

	/// A collection targeted by the fixture already holds documents.
	#[error(
		"The collection '{0}' is not empty, all collections should be empty prior to testing"
	)]
	CollectionsNotEmpty(String),

	/// Rollback was refused because the collections were not empty before the push.
	///
	/// `cause` holds the push failure that triggered the rollback, if any.
	#[error("The collections weren't empty to begin with, rollback aborted.")]
	RollbackIllegal {
		/// Error that triggered the rollback attempt.
		#[source]
		cause: Option<Box<FixtureError>>,
	},

	/// None of the keys of an alternative field name a collection of the fixture.
	#[error("This fixture does not include data for the collections [{}]", .0.join(", "))]
	ReferencedRecordNotFound(Vec<String>),

	/// The referenced record was never assigned an identifier by the store.
	#[error("The processed value of field '{field}' is missing")]
	MissingProcessedValue {
		/// Record key whose identifier is missing.
		field: String,
	},

	/// A collection referenced itself, directly or through other collections.
	#[error("Cyclic reference detected while inserting '{collection}': {}", .chain.join(" -> "))]
	CyclicReference {
		/// Collection that was re-entered.
		collection: String,
		/// Collections in insertion order, ending with the re-entered one.
		chain: Vec<String>,
	},

	/// The fixture has no collection with this name.
	#[error("This fixture does not include a collection named '{0}'")]
	NoSuchCollection(String),

	/// The referenced collection exists but has no record under this key.
	#[error("The collection '{collection}' has no record named '{key}'")]
	UnknownRecordKey {
		/// Referenced collection.
		collection: String,
		/// Missing record key.
		key: String,
	},

	/// Failure while resolving or inserting one record, with its location.
	#[error(
		"In record '{record}' to be inserted into '{collection}'{}: {source}",
		.field.as_ref().map(|f| format!(", field '{f}'")).unwrap_or_default()
	)]
	Insertion {
		/// Collection being inserted.
		collection: String,
		/// Record key being inserted.
		record: String,
		/// Top-level field being resolved, `None` for store failures.
		field: Option<String>,
		/// Error raised by the failing operation.
		#[source]
		source: Box<FixtureError>,
	},

	/// The fixture directory does not exist.
	#[error("Fixture not found: {0}")]
	FixtureNotFound(String),

	/// A fixture file does not have the expected shape.
	#[error("Invalid fixture: {0}")]
	InvalidFixture(String),

	/// Unsupported fixture file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// The store client failed.
	#[error("Store error: {0}")]
	Store(#[from] StoreError),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// YAML deserialization error (when the yaml feature is enabled).
	#[cfg(feature = "yaml")]
	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	/// Settings file could not be parsed.
	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),
}

impl FixtureError {
	/// Returns the innermost error, skipping [`FixtureError::Insertion`] wrappers.
	pub fn root_cause(&self) -> &FixtureError {
		match self {
			FixtureError::Insertion { source, .. } => source.root_cause(),
			other => other,
		}
	}

	/// Wraps this error with the record location, unless it already carries one.
	///
	/// Errors raised while inserting a referenced collection keep the location
	/// of the record that actually failed.
	pub(crate) fn at_record(
		self,
		collection: &str,
		record: &str,
		field: Option<&str>,
	) -> FixtureError {
		match self {
			err @ FixtureError::Insertion { .. } => err,
			err => FixtureError::Insertion {
				collection: collection.to_string(),
				record: record.to_string(),
				field: field.map(str::to_string),
				source: Box::new(err),
			},
		}
	}
}

/// Result type alias for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;
