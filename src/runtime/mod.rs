//! Show runtime
//!
//! Ties each show's scheduler, camera health monitor, runtime camera state
//! and fallback manager to one switcher connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               ShowRegistry               │
//! │                                          │
//! │  ┌────────────────────────────────────┐  │
//! │  │            ShowRuntime             │  │
//! │  │  SegmentScheduler ──► switcher     │  │
//! │  │  CameraHealthMonitor               │  │
//! │  │        │ status changes            │  │
//! │  │        ▼                           │  │
//! │  │  CameraFallbackManager ──► switcher│  │
//! │  └────────────────────────────────────┘  │
//! │                                          │
//! │  SwitcherConnectionPool (shared)         │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use showrunner::runtime::ShowRegistry;
//!
//! let registry = ShowRegistry::new(settings)?;
//! let show = registry.load(ShowConfig::load(path)?).await?;
//! show.start_show().await?;
//! ```

pub mod registry;
pub mod show;

pub use registry::ShowRegistry;
pub use show::{ShowRuntime, ShowSummary, DRY_RUN_ADDRESS};
