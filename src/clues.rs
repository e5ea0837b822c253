//! Clues handed out to teams.
//!
//! - `catalog`: the ordered clue list, built in or loaded from configuration.
//! - `distributor`: the pure split of that list into per-team blocks.

pub mod catalog;
pub mod distributor;

pub use catalog::{Clue, ClueCatalog};
pub use distributor::distribute;
