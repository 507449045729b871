//! Fixture settings.
//!
//! Settings are an explicit value handed to a
//! [`FixtureContext`](crate::FixtureContext) at construction. They can be
//! built in code, read from a TOML file or taken from the environment.
//!
//! ```toml
//! # fixtures.toml
//! fixtures_root = "tests/fixtures"
//! stash_file = ".stash"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FixtureResult;

/// Default directory holding fixture folders.
pub const DEFAULT_FIXTURES_ROOT: &str = "test/fixtures";

/// Default name of the stash file inside the fixtures root.
pub const DEFAULT_STASH_FILE: &str = ".stash";

/// Environment variable overriding [`FixtureSettings::fixtures_root`].
pub const FIXTURES_ROOT_ENV: &str = "FIXTURES_ROOT";

/// Environment variable overriding [`FixtureSettings::stash_file`].
pub const FIXTURES_STASH_FILE_ENV: &str = "FIXTURES_STASH_FILE";

/// Where fixtures live and where pushed fixture names are stashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSettings {
	/// Directory containing one sub-directory per fixture.
	pub fixtures_root: PathBuf,

	/// File name, relative to `fixtures_root`, of the stash log.
	pub stash_file: String,
}

impl Default for FixtureSettings {
	fn default() -> Self {
		Self {
			fixtures_root: PathBuf::from(DEFAULT_FIXTURES_ROOT),
			stash_file: DEFAULT_STASH_FILE.to_string(),
		}
	}
}

impl FixtureSettings {
	/// Creates settings with the default paths.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the fixtures root directory.
	pub fn with_fixtures_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.fixtures_root = root.into();
		self
	}

	/// Sets the stash file name.
	pub fn with_stash_file(mut self, name: impl Into<String>) -> Self {
		self.stash_file = name.into();
		self
	}

	/// Reads settings from a TOML file. Missing keys keep their defaults.
	pub fn from_toml_file(path: &Path) -> FixtureResult<Self> {
		let content = fs::read_to_string(path)?;
		Self::from_toml_str(&content)
	}

	/// Parses settings from TOML text.
	pub fn from_toml_str(content: &str) -> FixtureResult<Self> {
		Ok(toml::from_str(content)?)
	}

	/// Builds default settings, overridden by `FIXTURES_ROOT` and `FIXTURES_STASH_FILE`.
	pub fn from_env() -> Self {
		Self::default().merge_env()
	}

	/// Applies environment overrides on top of these settings.
	pub fn merge_env(mut self) -> Self {
		if let Ok(root) = env::var(FIXTURES_ROOT_ENV)
			&& !root.is_empty()
		{
			self.fixtures_root = PathBuf::from(root);
		}
		if let Ok(stash) = env::var(FIXTURES_STASH_FILE_ENV)
			&& !stash.is_empty()
		{
			self.stash_file = stash;
		}
		self
	}

	/// Directory of the named fixture.
	pub fn fixture_dir(&self, fixture: &str) -> PathBuf {
		self.fixtures_root.join(fixture)
	}

	/// Full path of the stash file.
	pub fn stash_path(&self) -> PathBuf {
		self.fixtures_root.join(&self.stash_file)
	}
}
