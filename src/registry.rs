//! Process-wide alias registry.
//!
//! [`Schema::namely`](crate::Schema::namely) installs a schema under a name;
//! other schemas may reference the name before it is registered, as long as
//! it is present by the time `parse`/`encode` runs. Registration is
//! write-last-wins.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::schema::Schema;

fn table() -> &'static RwLock<HashMap<String, Schema>> {
    static TABLE: OnceLock<RwLock<HashMap<String, Schema>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Install (or replace) a schema under `name`.
pub fn register(name: &str, schema: Schema) {
    table()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), schema);
}

/// Fetch a copy of the schema registered under `name`.
pub fn get(name: &str) -> Option<Schema> {
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Whether `name` is currently registered.
pub fn contains(name: &str) -> bool {
    table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(name)
}
