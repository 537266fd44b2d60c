//! Partial-update statement builder.
//!
//! # Invariants
//! - Column names come only from [`CompanyField::column`]; caller text never
//!   reaches the SQL string.
//! - Placeholder `?N` binds to `args[N - 1]`, in patch insertion order.
//! - A new name always carries its `name_key` alongside.

use crate::model::company::name_key;
use crate::model::patch::{CompanyPatch, PatchValue};
use rusqlite::types::Value;

/// Builds `col1 = ?1, col2 = ?2, ...` and the matching positional arguments.
///
/// Trailing parameters added by the caller start at `args.len() + 1`.
pub fn build_update_assignments(patch: &CompanyPatch) -> (String, Vec<Value>) {
    let mut assignments = Vec::with_capacity(patch.len());
    let mut args = Vec::with_capacity(patch.len());

    for entry in patch.entries() {
        args.push(patch_value_to_sql(entry));
        assignments.push(format!("{} = ?{}", entry.field().column(), args.len()));
        if let PatchValue::Name(name) = entry {
            args.push(Value::Text(name_key(name)));
            assignments.push(format!("name_key = ?{}", args.len()));
        }
    }

    (assignments.join(", "), args)
}

fn patch_value_to_sql(value: &PatchValue) -> Value {
    match value {
        PatchValue::Name(name) => Value::Text(name.trim().to_string()),
        PatchValue::Description(Some(description)) => Value::Text(description.clone()),
        PatchValue::Description(None) => Value::Null,
        PatchValue::AmountOfEmployees(amount) => Value::Integer(i64::from(*amount)),
        PatchValue::Registered(registered) => Value::Integer(i64::from(*registered)),
        PatchValue::Type(kind) => Value::Text(kind.as_str().to_string()),
    }
}
