//! HTTP surface over the session manager.
//!
//! Facilitator routes read the credential from the `x-facilitator-token`
//! header; participant routes are unauthenticated and rely on the gate policy.

pub mod routes;
pub mod types;
pub mod web_server;

pub use routes::{api_routes, ApiContext};
pub use web_server::WebServer;
