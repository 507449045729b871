//! Field value resolution.
//!
//! Turns one unresolved fixture value into the literal value written to the
//! store. The rules, applied recursively:
//!
//! | Shape                                  | Result                                  |
//! |----------------------------------------|-----------------------------------------|
//! | scalar                                 | unchanged                               |
//! | `{raw, processed, ..}`                 | `processed`                             |
//! | `{raw, <collection>: <key>, ..}`       | identifier of the referenced record     |
//! | `{<collection>: <key>}`                | identifier of the referenced record     |
//! | any other mapping or list              | resolved entry by entry                 |
//!
//! Resolving a reference may insert the referenced collection first, through
//! [`ReferenceContext::ensure_inserted`].

use serde_json::Value;

use crate::dataset::Fields;
use crate::error::{FixtureError, FixtureResult};

/// Key holding the human readable value of an alternative field.
pub const RAW_KEY: &str = "raw";

/// Key holding the literal substitute of an alternative field.
pub const PROCESSED_KEY: &str = "processed";

/// What the resolver needs to know about the fixture being pushed.
pub trait ReferenceContext {
	/// Returns true if the fixture contains a collection with this name.
	fn is_collection(&self, name: &str) -> bool;

	/// Makes sure every record of the collection has been inserted.
	fn ensure_inserted(&mut self, collection: &str) -> FixtureResult<()>;

	/// Identifier cached for a record, `None` if it was never inserted.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::UnknownRecordKey`] if the collection has no such record.
	fn identity_of(&self, collection: &str, key: &str) -> FixtureResult<Option<Value>>;
}

enum Shape<'a> {
	Scalar,
	Processed(&'a Value),
	Candidates(&'a Fields),
	Reference { collection: &'a str, key: &'a str },
	Mapping(&'a Fields),
	List(&'a [Value]),
}

fn classify<'a, C: ReferenceContext + ?Sized>(value: &'a Value, ctx: &C) -> Shape<'a> {
	match value {
		Value::Object(map) if map.contains_key(RAW_KEY) => match map.get(PROCESSED_KEY) {
			Some(processed) => Shape::Processed(processed),
			None => Shape::Candidates(map),
		},
		Value::Object(map) if map.len() == 1 => match map.iter().next() {
			Some((collection, Value::String(key))) if ctx.is_collection(collection) => {
				Shape::Reference { collection, key }
			}
			_ => Shape::Mapping(map),
		},
		Value::Object(map) => Shape::Mapping(map),
		Value::Array(items) => Shape::List(items),
		_ => Shape::Scalar,
	}
}

/// Resolves one field value.
///
/// # Errors
///
/// - [`FixtureError::ReferencedRecordNotFound`] if an alternative without
///   `processed` has no key naming a collection of the fixture.
/// - [`FixtureError::UnknownRecordKey`] if the referenced record does not exist.
/// - [`FixtureError::MissingProcessedValue`] if the referenced record has no
///   identifier after its collection was inserted.
/// - Anything raised while inserting the referenced collection.
pub fn resolve<C: ReferenceContext + ?Sized>(value: &Value, ctx: &mut C) -> FixtureResult<Value> {
	match classify(value, ctx) {
		Shape::Scalar => Ok(value.clone()),
		Shape::Processed(processed) => Ok(processed.clone()),
		Shape::Reference { collection, key } => resolve_reference(collection, key, ctx),
		Shape::Candidates(map) => {
			let target = map.iter().find_map(|(name, key)| match key {
				Value::String(key) if ctx.is_collection(name) => Some((name, key)),
				_ => None,
			});
			match target {
				Some((collection, key)) => resolve_reference(collection, key, ctx),
				None => Err(FixtureError::ReferencedRecordNotFound(
					map.keys().cloned().collect(),
				)),
			}
		}
		Shape::Mapping(map) => resolve_fields(map, ctx).map(Value::Object),
		Shape::List(items) => items
			.iter()
			.map(|item| resolve(item, ctx))
			.collect::<FixtureResult<Vec<_>>>()
			.map(Value::Array),
	}
}

/// Resolves every entry of a mapping, keeping its order.
pub fn resolve_fields<C: ReferenceContext + ?Sized>(
	fields: &Fields,
	ctx: &mut C,
) -> FixtureResult<Fields> {
	let mut resolved = Fields::new();
	for (name, value) in fields {
		resolved.insert(name.clone(), resolve(value, ctx)?);
	}
	Ok(resolved)
}

fn resolve_reference<C: ReferenceContext + ?Sized>(
	collection: &str,
	key: &str,
	ctx: &mut C,
) -> FixtureResult<Value> {
	ctx.ensure_inserted(collection)?;
	ctx.identity_of(collection, key)?
		.ok_or_else(|| FixtureError::MissingProcessedValue {
			field: key.to_string(),
		})
}
