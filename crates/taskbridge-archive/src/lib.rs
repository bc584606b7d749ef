//! `taskbridge-archive` – Action Archive
//!
//! A durable journal of every action a tree leaf node reported executing,
//! keyed by `(group, id)`, so a human or supervisor can reconstruct history
//! after a fault.
//!
//! # Modules
//!
//! - [`clerk`] – [`ActionArchive`]: the in-memory dictionary with atomic
//!   store/reload persistence.
//! - [`defaults`] – the static per-skill default-parameter tables, embedded
//!   as a structured resource and exposed as a pure lookup.

pub mod clerk;
pub mod defaults;

pub use clerk::{ActionArchive, ArchiveEntry, ArchiveError};
pub use defaults::default_context;
