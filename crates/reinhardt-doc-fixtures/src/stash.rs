//! Append-only log of pushed fixture names.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::FixtureResult;

/// Line-delimited stash file kept in the fixtures root.
#[derive(Debug, Clone)]
pub struct Stash {
	path: PathBuf,
}

impl Stash {
	/// Opens the stash at `path`. The file is created on first append.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Location of the stash file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Appends one fixture name as a new line.
	pub fn append(&self, fixture: &str) -> FixtureResult<()> {
		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let mut file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)?;
		writeln!(file, "{fixture}")?;

		tracing::debug!(fixture = %fixture, path = %self.path.display(), "stashed fixture");
		Ok(())
	}

	/// Names appended so far, oldest first. A missing file reads as empty.
	pub fn entries(&self) -> FixtureResult<Vec<String>> {
		match fs::read_to_string(&self.path) {
			Ok(content) => Ok(content
				.lines()
				.filter(|line| !line.is_empty())
				.map(str::to_string)
				.collect()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(e.into()),
		}
	}
}
