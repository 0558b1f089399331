//! showrunner - live broadcast show runtime
//!
//! Runs a show's segments against a production switcher, watches camera feeds
//! and swaps failed cameras out on air.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Process settings and per-show configuration
//! - [`models`] - Segments, cameras and transitions
//! - [`scheduler`] - Segment scheduling, history and operator overrides
//! - [`camera`] - Health monitoring, runtime coverage and fallback
//! - [`switcher`] - Switcher connections, commands and reconnects
//! - [`runtime`] - Per-show wiring and the show registry
//! - [`api`] - HTTP control API
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Timers and conversions
//!
//! # Example
//!
//! ```no_run
//! use showrunner::config::{AppConfig, ShowConfig};
//! use showrunner::runtime::ShowRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ShowRegistry::new(AppConfig::from_env()?)?;
//!     let show = registry
//!         .load(ShowConfig::load(std::path::Path::new("finals.toml"))?)
//!         .await?;
//!     show.start_show().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod camera;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod runtime;
pub mod scheduler;
pub mod switcher;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, ShowConfig};
    pub use crate::error::{Error, ErrorCategory, Result, ShowrunnerErrorTrait};
    pub use crate::models::{CameraConfig, Segment, SegmentType, TransitionSpec};
    pub use crate::runtime::{ShowRegistry, ShowRuntime};
    pub use crate::scheduler::{ScheduleEvent, SegmentScheduler};
}

// Direct re-exports for convenience
pub use models::{CameraConfig, Segment, SegmentType};
