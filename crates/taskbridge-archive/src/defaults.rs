//! Static per-skill default parameter tables.
//!
//! The tables are embedded as a structured JSON resource rather than code, so
//! parameter updates do not require touching logic.  Lookup is pure: the
//! tables are never mutated by archiving.

use std::sync::OnceLock;

use serde_json::Value;
use tracing::error;

use taskbridge_types::ActionPhase;

static DEFAULT_CONTEXTS: OnceLock<Value> = OnceLock::new();

fn table() -> &'static Value {
    DEFAULT_CONTEXTS.get_or_init(|| {
        serde_json::from_str(include_str!("../data/default_contexts.json")).unwrap_or_else(|e| {
            // An unparsable embedded resource is a build defect; degrade to
            // an empty table so every lookup reports "absent" instead of
            // bringing the session down.
            error!(error = %e, "embedded default-context table is malformed");
            Value::Object(serde_json::Map::new())
        })
    })
}

/// The default parameter bundle for `phase`, or `None` when the phase has no
/// string identifier or no table entry.
pub fn default_context(phase: ActionPhase) -> Option<Value> {
    let key = phase.as_str()?;
    table().get(key).cloned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
