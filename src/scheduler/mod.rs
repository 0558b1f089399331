//! Segment scheduling for live shows
//!
//! # Overview
//!
//! A show is an ordered list of segments. The [`SegmentScheduler`] puts one
//! segment on air at a time, advances automatically when a timed segment runs
//! out, and lets operators step, jump, pause and hot-swap the run-of-show
//! while it is on air.
//!
//! Each activation issues the segment's switcher calls (transition, scene,
//! media restart, audio) and fires its graphic. Failed calls are reported as
//! [`ScheduleEvent::CommandFailed`] and never stop the show.
//!
//! # Modules
//!
//! - [`engine`] - The scheduler itself
//! - [`events`] - Notifications published to subscribers
//! - [`state`] - Snapshots, history and the operator override log
//! - [`transition`] - Transition selection rules
//! - [`graphics`] - Graphics trigger seam
//! - [`error`] - Scheduler errors
//!
//! # Quick Start
//!
//! ```ignore
//! use showrunner::scheduler::{SchedulerConfig, SegmentScheduler};
//!
//! let scheduler = SegmentScheduler::new(show, SchedulerConfig::default(), pool, None);
//! let mut events = scheduler.subscribe();
//!
//! scheduler.start().await?;
//! scheduler.advance("director").await?;
//!
//! let state = scheduler.get_state().await;
//! println!("On air: {:?}", state.current_segment.map(|s| s.name));
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod graphics;
pub mod state;
pub mod transition;

pub use engine::{SchedulerConfig, SegmentScheduler};
pub use error::{SchedulerError, SchedulerResult};
pub use events::ScheduleEvent;
pub use graphics::{GraphicsController, GraphicsError, HttpGraphicsController};
pub use state::{EngineSnapshot, HistoryEntry, HistoryReason, Lifecycle, OverrideEntry, OverrideKind};
pub use transition::select_transition;
