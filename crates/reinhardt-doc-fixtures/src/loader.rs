//! Fixture directory loading.
//!
//! A fixture is a directory under the fixtures root holding one file per
//! collection:
//!
//! ```text
//! test/fixtures/
//! └── blog/
//!     ├── comments.yaml
//!     └── users.yaml
//! ```
//!
//! Each file maps record keys to field mappings:
//!
//! ```yaml
//! pepe:
//!   name: Jonah
//!   password: { raw: secret, processed: 35ferwt352 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::dataset::{FixtureDataset, RecordSet};
use crate::error::{FixtureError, FixtureResult};
use crate::settings::FixtureSettings;

/// Supported fixture file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FixtureFormat {
	/// YAML format (default, requires `yaml` feature).
	#[default]
	Yaml,

	/// JSON format.
	Json,
}

impl FixtureFormat {
	/// Determines the fixture format from a file extension.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_doc_fixtures::FixtureFormat;
	/// assert_eq!(FixtureFormat::from_extension("json"), Some(FixtureFormat::Json));
	/// assert_eq!(FixtureFormat::from_extension("yml"), Some(FixtureFormat::Yaml));
	/// assert_eq!(FixtureFormat::from_extension("xml"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the fixture format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}

	/// Returns the default file extension for this format.
	pub fn extension(&self) -> &'static str {
		match self {
			Self::Json => "json",
			Self::Yaml => "yaml",
		}
	}
}

impl std::fmt::Display for FixtureFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}

/// Reads fixture directories into [`FixtureDataset`]s.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
	root: PathBuf,
}

impl DatasetLoader {
	/// Creates a loader reading fixtures below `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Creates a loader for the fixtures root of the settings.
	pub fn from_settings(settings: &FixtureSettings) -> Self {
		Self::new(settings.fixtures_root.clone())
	}

	/// Directory fixtures are read from.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Loads every collection file of the named fixture.
	///
	/// Files are read in file name order. Files whose extension is not a
	/// fixture format are skipped.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The fixture directory does not exist
	/// - Two files describe the same collection
	/// - A file cannot be read or parsed
	pub fn load(&self, fixture: &str) -> FixtureResult<FixtureDataset> {
		let dir = self.root.join(fixture);
		if !dir.is_dir() {
			return Err(FixtureError::FixtureNotFound(dir.display().to_string()));
		}

		let mut paths = Vec::new();
		for entry in fs::read_dir(&dir)? {
			let path = entry?.path();
			if path.is_file() {
				paths.push(path);
			}
		}
		paths.sort();

		let mut dataset = FixtureDataset::new();
		for path in paths {
			if FixtureFormat::from_path(&path).is_none() {
				tracing::debug!(path = %path.display(), "skipping non-fixture file");
				continue;
			}

			let (collection, records) = self.parse_file(&path)?;
			if dataset.contains(&collection) {
				return Err(FixtureError::InvalidFixture(format!(
					"collection '{collection}' is described by more than one file in {}",
					dir.display()
				)));
			}
			dataset.insert(collection, records);
		}

		tracing::info!(
			fixture = %fixture,
			collections = dataset.len(),
			records = dataset.record_count(),
			"loaded fixture"
		);
		Ok(dataset)
	}

	/// Parses one collection file. The collection is named after the file stem.
	pub fn parse_file(&self, path: &Path) -> FixtureResult<(String, RecordSet)> {
		let format = FixtureFormat::from_path(path).ok_or_else(|| {
			FixtureError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;

		let collection = path
			.file_stem()
			.and_then(|stem| stem.to_str())
			.ok_or_else(|| {
				FixtureError::InvalidFixture(format!(
					"cannot name a collection after {}",
					path.display()
				))
			})?
			.to_string();

		let content = fs::read_to_string(path)?;
		let records = self.parse_string(&collection, &content, format)?;
		Ok((collection, records))
	}

	/// Parses the content of one collection file.
	pub fn parse_string(
		&self,
		collection: &str,
		content: &str,
		format: FixtureFormat,
	) -> FixtureResult<RecordSet> {
		if content.trim().is_empty() {
			return Ok(RecordSet::new());
		}

		let value = match format {
			FixtureFormat::Json => serde_json::from_str::<Value>(content)?,
			FixtureFormat::Yaml => parse_yaml(content)?,
		};

		match value {
			Value::Null => Ok(RecordSet::new()),
			value => RecordSet::from_value(collection, value),
		}
	}
}

#[cfg(feature = "yaml")]
fn parse_yaml(content: &str) -> FixtureResult<Value> {
	Ok(serde_yaml::from_str(content)?)
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml(_content: &str) -> FixtureResult<Value> {
	Err(FixtureError::UnsupportedExtension(
		"YAML support requires the 'yaml' feature".to_string(),
	))
}
