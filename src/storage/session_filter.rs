//! Helpers for building `SessionFilter` values.
//!
//! This module re-exports `SessionFilter` and provides convenience builders
//! for common listing criteria.

use chrono::{DateTime, Utc};

// Re-export SessionFilter
pub use crate::storage::types::SessionFilter;

/// Sessions currently accepting participants, as offered on the join screen.
pub fn open_sessions() -> SessionFilter {
    SessionFilter { open_only: true, ..Default::default() }
}

/// Build a `SessionFilter` that matches sessions by exact group name.
pub fn by_group_name<S: Into<String>>(name: S) -> SessionFilter {
    SessionFilter { group_name: Some(name.into()), ..Default::default() }
}

/// Sessions created strictly before `cutoff`, the retention sweep's target.
pub fn created_before(cutoff: DateTime<Utc>) -> SessionFilter {
    SessionFilter { created_before: Some(cutoff), ..Default::default() }
}

/// Sessions created at or after `since`.
pub fn created_after(since: DateTime<Utc>) -> SessionFilter {
    SessionFilter { created_after: Some(since), ..Default::default() }
}
