//! HTTP control API
//!
//! Operator surface over the loaded shows: run-of-show control, camera
//! verification and reassignment, fallback inspection, and Prometheus
//! metrics.
//!
//! # Endpoints
//!
//! ```text
//! GET    /health
//! GET    /metrics
//! GET    /api/shows                       POST /api/shows
//! GET    /api/shows/{id}                  DELETE /api/shows/{id}
//! PUT    /api/shows/{id}/config
//! GET    /api/shows/{id}/state|history|overrides
//! POST   /api/shows/{id}/start|stop|pause|resume|advance|previous|goto|rehearsal
//! GET    /api/shows/{id}/cameras
//! POST   /api/shows/{id}/cameras/{camera}/verify|unverify|reassign|reset|fallback
//! GET    /api/shows/{id}/fallbacks        DELETE /api/shows/{id}/fallbacks[/{camera}]
//! ```

pub mod routes;
pub mod server;

pub use routes::{create_router, ApiError, ApiResponse, ErrorResponse};
pub use server::{ApiServer, AppState, ServerError};
