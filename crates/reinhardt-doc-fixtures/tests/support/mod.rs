//! Shared helpers for fixture integration tests.

#![allow(dead_code)]

use std::fs;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Writes `content` to `<root>/<fixture>/<file>`.
pub fn write_fixture(root: &TempDir, fixture: &str, file: &str, content: &str) {
	let dir = root.path().join(fixture);
	fs::create_dir_all(&dir).unwrap();
	fs::write(dir.join(file), content).unwrap();
}

/// Fixtures root with the `blog` fixture: comments reference users.
pub fn blog_root() -> TempDir {
	let root = TempDir::new().unwrap();
	write_fixture(
		&root,
		"blog",
		"comments.json",
		r#"{"flamewar": {"user": {"users": "pepe"}, "text": "FLAME"}}"#,
	);
	write_fixture(
		&root,
		"blog",
		"users.json",
		r#"{"pepe": {"name": "Jonah", "password": {"raw": "secret", "processed": "35ferwt352"}}}"#,
	);
	root
}

/// One captured log event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
	pub level: Level,
	pub message: String,
}

/// Records every event it sees.
#[derive(Debug, Clone, Default)]
pub struct EventCapture(Arc<Mutex<Vec<CapturedEvent>>>);

impl EventCapture {
	pub fn events(&self) -> Vec<CapturedEvent> {
		self.0.lock().unwrap().clone()
	}

	pub fn has(&self, level: Level, message: &str) -> bool {
		self.events()
			.iter()
			.any(|e| e.level == level && e.message == message)
	}
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
		if field.name() == "message" {
			self.0 = format!("{value:?}");
		}
	}
}

impl<S: Subscriber> Layer<S> for EventCapture {
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let mut visitor = MessageVisitor(String::new());
		event.record(&mut visitor);
		self.0.lock().unwrap().push(CapturedEvent {
			level: *event.metadata().level(),
			message: visitor.0,
		});
	}
}
