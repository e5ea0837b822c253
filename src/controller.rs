//! Process wiring: configuration in, storage and HTTP surface out.

pub mod controller_handler;

pub use controller_handler::Controller;
