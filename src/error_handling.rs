//! Error taxonomy shared by every layer of the crate.

pub mod types;
