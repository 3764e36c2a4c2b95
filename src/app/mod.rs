// App layer: HTTP surface (axum router, shared state, error responses).

pub mod error;
pub mod routes;
pub mod state;
