//! Field redaction
//!
//! Paths are dot separated (`user.password`). A `*` segment matches every
//! key of a map or every element of an array at that depth
//! (`users.*.token`). Matched values are replaced with [`REDACTED`];
//! paths that do not resolve are ignored.

use super::log_context::{FieldValue, Fields};

pub const REDACTED: &str = "[REDACTED]";

/// Return a copy of `fields` with every value at one of `paths` masked
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::{redact, FieldValue, LogContext};
///
/// let fields = LogContext::new()
///     .with_field("user", "alice")
///     .with_field("password", "hunter2")
///     .into_fields();
///
/// let masked = redact(&fields, &["password"]);
/// assert_eq!(masked["password"], FieldValue::from("[REDACTED]"));
/// assert_eq!(masked["user"], FieldValue::from("alice"));
/// ```
pub fn redact<S: AsRef<str>>(fields: &Fields, paths: &[S]) -> Fields {
    let mut fields = fields.clone();
    redact_in_place(&mut fields, paths);
    fields
}

pub(crate) fn redact_in_place<S: AsRef<str>>(fields: &mut Fields, paths: &[S]) {
    for path in paths {
        let segments: Vec<&str> = path.as_ref().split('.').collect();
        let Some((first, rest)) = segments.split_first() else {
            continue;
        };

        if *first == "*" {
            for value in fields.values_mut() {
                mask(value, rest);
            }
        } else if let Some(value) = fields.get_mut(*first) {
            mask(value, rest);
        }
    }
}

fn mask(value: &mut FieldValue, rest: &[&str]) {
    let Some((segment, tail)) = rest.split_first() else {
        *value = FieldValue::String(REDACTED.to_string());
        return;
    };

    match value {
        FieldValue::Map(map) if *segment == "*" => {
            for child in map.values_mut() {
                mask(child, tail);
            }
        }
        FieldValue::Map(map) => {
            if let Some(child) = map.get_mut(*segment) {
                mask(child, tail);
            }
        }
        FieldValue::Array(items) if *segment == "*" => {
            for child in items.iter_mut() {
                mask(child, tail);
            }
        }
        FieldValue::Array(items) => {
            if let Some(child) = segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                mask(child, tail);
            }
        }
        _ => {}
    }
}
