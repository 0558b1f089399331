//! Segment scheduler
//!
//! One scheduler owns the run-of-show of one show. Every operation, including
//! the periodic tick, holds the state lock for its whole duration (outbound
//! switcher calls included), so segment changes are applied one at a time and
//! in the order they were requested.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use super::error::{SchedulerError, SchedulerResult};
use super::events::ScheduleEvent;
use super::graphics::GraphicsController;
use super::state::{
    timing, EngineSnapshot, HistoryEntry, HistoryReason, Lifecycle, OverrideEntry, OverrideKind,
};
use super::transition::select_transition;
use crate::config::ShowConfig;
use crate::metrics;
use crate::models::{Segment, SegmentType, TransitionSpec};
use crate::switcher::{SwitcherCommand, SwitcherConnection, SwitcherConnectionPool, SwitcherError};
use crate::utils::{duration_ms, volume_to_db, PeriodicTask};

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often elapsed time is checked and `Tick` published
    pub tick_interval: Duration,

    /// Skip switcher and graphics calls while still publishing events
    pub rehearsal: bool,

    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            rehearsal: false,
            event_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone)]
enum Position {
    Idle,
    At(usize),
    /// The on-air segment was removed by a config update. It stays on air
    /// until the operator moves; `resume_index` is where advance lands.
    Detached {
        segment: Segment,
        resume_index: usize,
    },
}

struct EngineState {
    show: ShowConfig,
    lifecycle: Lifecycle,
    position: Position,
    rehearsal: bool,

    segment_started_at: Option<Instant>,
    segment_started_wall: Option<DateTime<Utc>>,
    paused_at: Option<Instant>,
    show_started_at: Option<DateTime<Utc>>,
    hold_max_notified: bool,

    history: Vec<HistoryEntry>,
    override_log: Vec<OverrideEntry>,
    ticker: Option<PeriodicTask>,
}

impl EngineState {
    fn current_segment(&self) -> Option<&Segment> {
        match &self.position {
            Position::Idle => None,
            Position::At(index) => self.show.segments.get(*index),
            Position::Detached { segment, .. } => Some(segment),
        }
    }

    fn current_index(&self) -> i64 {
        match &self.position {
            Position::Idle => -1,
            Position::At(index) => *index as i64,
            Position::Detached { resume_index, .. } => {
                (*resume_index).min(self.show.segments.len().saturating_sub(1)) as i64
            }
        }
    }

    fn next_index(&self) -> Option<usize> {
        let candidate = match &self.position {
            Position::Idle => return None,
            Position::At(index) => index + 1,
            Position::Detached { resume_index, .. } => *resume_index,
        };
        (candidate < self.show.segments.len()).then_some(candidate)
    }

    fn previous_index(&self) -> Option<usize> {
        match &self.position {
            Position::Idle => None,
            Position::At(index) => index.checked_sub(1),
            Position::Detached { resume_index, .. } => {
                (*resume_index).min(self.show.segments.len()).checked_sub(1)
            }
        }
    }

    fn elapsed_ms(&self) -> u64 {
        match self.segment_started_at {
            Some(started) => {
                let now = self.paused_at.unwrap_or_else(Instant::now);
                duration_ms(now.saturating_duration_since(started))
            }
            None => 0,
        }
    }

    fn segment_at(&self, index: Option<usize>) -> Option<Segment> {
        index.and_then(|i| self.show.segments.get(i)).cloned()
    }
}

/// One outbound call made when a segment is activated
enum Action {
    Switcher(SwitcherCommand),
    Graphic,
}

/// Drives a show's segments through time and tells the switcher about it
pub struct SegmentScheduler {
    show_id: String,
    config: SchedulerConfig,
    pool: Arc<SwitcherConnectionPool>,
    graphics: Option<Arc<dyn GraphicsController>>,
    state: Mutex<EngineState>,
    event_tx: broadcast::Sender<ScheduleEvent>,
    self_ref: Weak<SegmentScheduler>,
}

impl SegmentScheduler {
    pub fn new(
        show: ShowConfig,
        config: SchedulerConfig,
        pool: Arc<SwitcherConnectionPool>,
        graphics: Option<Arc<dyn GraphicsController>>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let show_id = show.id.clone();
        let rehearsal = config.rehearsal;

        Arc::new_cyclic(|self_ref| Self {
            show_id,
            config,
            pool,
            graphics,
            state: Mutex::new(EngineState {
                show,
                lifecycle: Lifecycle::Stopped,
                position: Position::Idle,
                rehearsal,
                segment_started_at: None,
                segment_started_wall: None,
                paused_at: None,
                show_started_at: None,
                hold_max_notified: false,
                history: Vec::new(),
                override_log: Vec::new(),
                ticker: None,
            }),
            event_tx,
            self_ref: self_ref.clone(),
        })
    }

    pub fn show_id(&self) -> &str {
        &self.show_id
    }

    /// Subscribe to scheduler events
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ScheduleEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Start the show at its first segment
    ///
    /// Calling this on a running or paused show does nothing.
    pub async fn start(&self) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;

        if st.lifecycle != Lifecycle::Stopped {
            tracing::debug!(show_id = %self.show_id, lifecycle = %st.lifecycle, "Start ignored");
            return Ok(());
        }
        if st.show.segments.is_empty() {
            return Err(SchedulerError::NoSegments);
        }

        st.lifecycle = Lifecycle::Running;
        st.show_started_at = Some(Utc::now());

        tracing::info!(
            show_id = %self.show_id,
            segments = st.show.segments.len(),
            rehearsal = st.rehearsal,
            "Show started"
        );
        self.emit(ScheduleEvent::ShowStarted {
            show_id: self.show_id.clone(),
            segment_count: st.show.segments.len(),
        });

        self.enter_segment(&mut st, 0, None).await;
        st.ticker = Some(self.spawn_ticker());
        Ok(())
    }

    /// Stop the show, closing out the on-air segment as completed
    pub async fn stop(&self, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;
        if st.lifecycle == Lifecycle::Stopped {
            return Ok(());
        }

        let from = st.current_segment().map(|s| s.id.clone());
        let elapsed = st.elapsed_ms();

        self.leave_current(&mut st, HistoryReason::Completed, Some(actor));
        self.record_override(
            &mut st,
            OverrideEntry::new(OverrideKind::Stop, actor, from, None, elapsed),
        );
        self.halt(&mut st, false);
        Ok(())
    }

    /// Suspend ticking; elapsed time freezes until [`resume`](Self::resume)
    pub async fn pause(&self, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;
        if st.lifecycle != Lifecycle::Running {
            return Ok(());
        }

        if let Some(ticker) = st.ticker.take() {
            ticker.cancel();
        }
        st.paused_at = Some(Instant::now());
        st.lifecycle = Lifecycle::Paused;

        let segment_id = st.current_segment().map(|s| s.id.clone());
        let elapsed_ms = st.elapsed_ms();

        tracing::info!(show_id = %self.show_id, ?segment_id, elapsed_ms, actor, "Show paused");
        self.record_override(
            &mut st,
            OverrideEntry::new(OverrideKind::Pause, actor, segment_id.clone(), None, elapsed_ms),
        );
        self.emit(ScheduleEvent::Paused {
            segment_id,
            elapsed_ms,
        });
        Ok(())
    }

    pub async fn resume(&self, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;
        if st.lifecycle != Lifecycle::Paused {
            return Ok(());
        }

        if let (Some(started), Some(paused)) = (st.segment_started_at, st.paused_at.take()) {
            st.segment_started_at = Some(started + paused.elapsed());
        }
        st.lifecycle = Lifecycle::Running;
        st.ticker = Some(self.spawn_ticker());

        let segment_id = st.current_segment().map(|s| s.id.clone());
        let elapsed_ms = st.elapsed_ms();

        tracing::info!(show_id = %self.show_id, ?segment_id, elapsed_ms, actor, "Show resumed");
        self.record_override(
            &mut st,
            OverrideEntry::new(OverrideKind::Resume, actor, segment_id.clone(), None, elapsed_ms),
        );
        self.emit(ScheduleEvent::Resumed {
            segment_id,
            elapsed_ms,
        });
        Ok(())
    }

    /// Move to the next segment
    ///
    /// A hold segment can't be left before its minimum duration.
    pub async fn advance(&self, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;
        let Some(current) = st.current_segment().cloned() else {
            return Ok(());
        };

        let elapsed_ms = st.elapsed_ms();
        let min_duration_ms = current.min_duration_ms();
        if current.is_hold() && elapsed_ms < min_duration_ms {
            return Err(SchedulerError::HoldMinimumNotMet {
                segment_id: current.id,
                elapsed_ms,
                min_duration_ms,
            });
        }

        let next = st
            .next_index()
            .ok_or_else(|| SchedulerError::at_last(&current.id))?;
        let to = st.show.segments[next].id.clone();

        self.transition_to(&mut st, next, HistoryReason::ManualAdvance, Some(actor))
            .await;
        self.record_override(
            &mut st,
            OverrideEntry::new(
                OverrideKind::Advance,
                actor,
                Some(current.id),
                Some(to),
                elapsed_ms,
            ),
        );
        Ok(())
    }

    /// Move back one segment
    pub async fn previous(&self, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;
        let Some(current) = st.current_segment().cloned() else {
            return Ok(());
        };

        let target = st
            .previous_index()
            .ok_or_else(|| SchedulerError::at_first(&current.id))?;
        let to = st.show.segments[target].id.clone();
        let elapsed_ms = st.elapsed_ms();

        self.transition_to(&mut st, target, HistoryReason::ManualPrevious, Some(actor))
            .await;
        self.record_override(
            &mut st,
            OverrideEntry::new(
                OverrideKind::Previous,
                actor,
                Some(current.id),
                Some(to),
                elapsed_ms,
            ),
        );
        Ok(())
    }

    /// Jump straight to a segment by id
    pub async fn go_to_segment(&self, segment_id: &str, actor: &str) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;

        let target = st
            .show
            .segments
            .iter()
            .position(|s| s.id == segment_id)
            .ok_or_else(|| SchedulerError::segment_not_found(segment_id))?;

        if st.lifecycle == Lifecycle::Stopped {
            return Ok(());
        }

        let from = st.current_segment().map(|s| s.id.clone());
        let elapsed_ms = st.elapsed_ms();

        self.transition_to(&mut st, target, HistoryReason::Jump, Some(actor))
            .await;
        self.record_override(
            &mut st,
            OverrideEntry::new(
                OverrideKind::Jump,
                actor,
                from,
                Some(segment_id.to_string()),
                elapsed_ms,
            ),
        );
        Ok(())
    }

    /// Replace the show's configuration without interrupting the on-air segment
    ///
    /// The current segment is tracked by id. If it no longer exists it stays
    /// on air, flagged as deleted, and the next advance picks up at the
    /// segment that now occupies its old position.
    pub async fn update_config(&self, show: ShowConfig) -> SchedulerResult<()> {
        let mut st = self.state.lock().await;

        if st.lifecycle != Lifecycle::Stopped && show.segments.is_empty() {
            return Err(SchedulerError::invalid_config(
                "a running show must keep at least one segment",
            ));
        }

        let current = match std::mem::replace(&mut st.position, Position::Idle) {
            Position::Idle => None,
            Position::At(index) => st
                .show
                .segments
                .get(index)
                .cloned()
                .map(|segment| (segment, index, false)),
            Position::Detached {
                segment,
                resume_index,
            } => Some((segment, resume_index, true)),
        };

        st.show = show;

        st.position = match current {
            None => Position::Idle,
            Some((segment, old_index, already_detached)) => {
                match st.show.segments.iter().position(|s| s.id == segment.id) {
                    Some(index) => Position::At(index),
                    None => {
                        if !already_detached {
                            tracing::warn!(
                                show_id = %self.show_id,
                                segment_id = %segment.id,
                                resume_index = old_index,
                                "On-air segment removed from configuration"
                            );
                            self.emit(ScheduleEvent::CurrentSegmentDeleted {
                                segment_id: segment.id.clone(),
                                resume_index: old_index,
                            });
                        }
                        Position::Detached {
                            segment,
                            resume_index: old_index,
                        }
                    }
                }
            }
        };

        if st.lifecycle != Lifecycle::Stopped {
            metrics::set_current_segment(&self.show_id, st.current_index());
        }

        let current_segment_id = st.current_segment().map(|s| s.id.clone());
        tracing::info!(
            show_id = %self.show_id,
            segments = st.show.segments.len(),
            ?current_segment_id,
            "Show configuration updated"
        );
        self.emit(ScheduleEvent::ConfigUpdated {
            segment_count: st.show.segments.len(),
            current_segment_id,
        });
        Ok(())
    }

    /// Toggle rehearsal mode
    pub async fn set_rehearsal(&self, enabled: bool) {
        let mut st = self.state.lock().await;
        if st.rehearsal == enabled {
            return;
        }
        st.rehearsal = enabled;
        tracing::info!(show_id = %self.show_id, enabled, "Rehearsal mode changed");
        self.emit(ScheduleEvent::RehearsalChanged { enabled });
    }

    pub async fn is_rehearsal(&self) -> bool {
        self.state.lock().await.rehearsal
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.state.lock().await.lifecycle
    }

    pub async fn show_config(&self) -> ShowConfig {
        self.state.lock().await.show.clone()
    }

    /// Segments that have been on air, oldest first
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.history.clone()
    }

    /// Operator actions, oldest first
    pub async fn override_log(&self) -> Vec<OverrideEntry> {
        self.state.lock().await.override_log.clone()
    }

    /// Snapshot of the current state
    pub async fn get_state(&self) -> EngineSnapshot {
        let st = self.state.lock().await;

        let elapsed_ms = st.elapsed_ms();
        let current = st.current_segment().cloned();
        let (remaining_ms, progress) = current
            .as_ref()
            .map(|s| timing(s, elapsed_ms))
            .unwrap_or((None, 0.0));
        let hold_remaining_ms = current
            .as_ref()
            .filter(|s| s.is_hold())
            .map(|s| s.min_duration_ms().saturating_sub(elapsed_ms));

        EngineSnapshot {
            show_id: self.show_id.clone(),
            lifecycle: st.lifecycle,
            rehearsal: st.rehearsal,
            current_segment_index: st.current_index(),
            next_segment: st.segment_at(st.next_index()),
            previous_segment: st.segment_at(st.previous_index()),
            current_segment_deleted: matches!(st.position, Position::Detached { .. }),
            current_segment: current,
            elapsed_ms,
            remaining_ms,
            progress,
            hold_locked: hold_remaining_ms.is_some_and(|r| r > 0),
            hold_remaining_ms,
            segment_count: st.show.segments.len(),
            history_count: st.history.len(),
            override_count: st.override_log.len(),
            show_started_at: st.show_started_at,
            segment_started_at: st.segment_started_wall,
        }
    }

    /// Evaluate elapsed time on the current segment
    ///
    /// Runs from the internal timer; exposed so callers can force an
    /// evaluation.
    pub async fn tick(&self) {
        let mut st = self.state.lock().await;
        if st.lifecycle != Lifecycle::Running {
            return;
        }
        let Some(segment) = st.current_segment().cloned() else {
            return;
        };

        let elapsed_ms = st.elapsed_ms();
        let (remaining_ms, progress) = timing(&segment, elapsed_ms);
        self.emit(ScheduleEvent::Tick {
            segment_id: segment.id.clone(),
            elapsed_ms,
            remaining_ms,
            progress,
        });

        if segment.is_hold() {
            if let Some(max_ms) = segment.max_duration_ms() {
                if elapsed_ms >= max_ms && !st.hold_max_notified {
                    st.hold_max_notified = true;
                    tracing::warn!(
                        show_id = %self.show_id,
                        segment_id = %segment.id,
                        elapsed_ms,
                        max_ms,
                        "Hold exceeded its maximum duration"
                    );
                    self.emit(ScheduleEvent::HoldMaxReached {
                        segment_id: segment.id.clone(),
                        elapsed_ms,
                        max_duration_ms: max_ms,
                    });
                }
            }
            return;
        }

        if !segment.auto_advance {
            return;
        }
        let Some(duration) = segment.duration_ms() else {
            return;
        };
        if elapsed_ms < duration {
            return;
        }

        match st.next_index() {
            Some(next) => {
                self.transition_to(&mut st, next, HistoryReason::AutoAdvance, None)
                    .await
            }
            None => self.complete_naturally(&mut st),
        }
    }

    fn spawn_ticker(&self) -> PeriodicTask {
        let weak = self.self_ref.clone();
        PeriodicTask::spawn("segment-scheduler", self.config.tick_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.tick().await;
                }
            }
        })
    }

    fn record_override(&self, st: &mut EngineState, entry: OverrideEntry) {
        tracing::info!(
            show_id = %self.show_id,
            kind = ?entry.kind,
            actor = %entry.actor,
            from = ?entry.from_segment_id,
            to = ?entry.to_segment_id,
            "Operator override"
        );
        st.override_log.push(entry.clone());
        self.emit(ScheduleEvent::OverrideRecorded(entry));
    }

    /// Append the on-air segment to history and return it
    fn leave_current(
        &self,
        st: &mut EngineState,
        reason: HistoryReason,
        actor: Option<&str>,
    ) -> Option<Segment> {
        let segment = st.current_segment()?.clone();
        let actual_duration_ms = st.elapsed_ms();
        let ended_at = Utc::now();

        st.history.push(HistoryEntry {
            segment_id: segment.id.clone(),
            segment_name: segment.name.clone(),
            started_at: st.segment_started_wall.unwrap_or(ended_at),
            ended_at,
            actual_duration_ms,
            planned_duration_ms: segment.duration_ms(),
            reason,
            actor: actor.map(str::to_string),
        });

        self.emit(ScheduleEvent::SegmentCompleted {
            segment_id: segment.id.clone(),
            reason,
            actual_duration_ms,
        });
        Some(segment)
    }

    async fn transition_to(
        &self,
        st: &mut EngineState,
        target: usize,
        reason: HistoryReason,
        actor: Option<&str>,
    ) {
        let outgoing = self.leave_current(st, reason, actor);
        self.enter_segment(st, target, outgoing.as_ref()).await;
    }

    fn complete_naturally(&self, st: &mut EngineState) {
        self.leave_current(st, HistoryReason::NaturalCompletion, None);
        tracing::info!(show_id = %self.show_id, "Show complete");
        self.emit(ScheduleEvent::ShowComplete {
            show_id: self.show_id.clone(),
        });
        self.halt(st, true);
    }

    fn halt(&self, st: &mut EngineState, completed_naturally: bool) {
        if let Some(ticker) = st.ticker.take() {
            ticker.cancel();
        }
        st.lifecycle = Lifecycle::Stopped;
        st.position = Position::Idle;
        st.segment_started_at = None;
        st.segment_started_wall = None;
        st.paused_at = None;
        st.hold_max_notified = false;

        metrics::set_current_segment(&self.show_id, -1);
        tracing::info!(show_id = %self.show_id, completed_naturally, "Show stopped");
        self.emit(ScheduleEvent::ShowStopped {
            show_id: self.show_id.clone(),
            completed_naturally,
        });
    }

    async fn enter_segment(&self, st: &mut EngineState, index: usize, outgoing: Option<&Segment>) {
        let Some(segment) = st.show.segments.get(index).cloned() else {
            return;
        };

        let now = Instant::now();
        st.position = Position::At(index);
        st.segment_started_at = Some(now);
        st.segment_started_wall = Some(Utc::now());
        st.paused_at = (st.lifecycle == Lifecycle::Paused).then_some(now);
        st.hold_max_notified = false;

        let transition = select_transition(&segment, outgoing, st.show.transitions.as_ref());

        metrics::set_current_segment(&self.show_id, index as i64);
        metrics::inc_segment_activations(&self.show_id, segment.segment_type.as_str());
        tracing::info!(
            show_id = %self.show_id,
            segment_id = %segment.id,
            index,
            segment_type = %segment.segment_type,
            transition = %transition.kind,
            "Segment activated"
        );
        let notices = self.run_actions(st, &segment, &transition).await;

        self.emit(ScheduleEvent::SegmentActivated {
            index,
            segment: segment.clone(),
            previous_segment_id: outgoing.map(|s| s.id.clone()),
            transition,
        });
        for notice in notices {
            self.emit(notice);
        }
    }

    /// Issue a segment's outbound calls, returning the notices to publish
    ///
    /// Order: transition and scene, then the type action (graphic, media or
    /// hold), then audio overrides, then the audio cue.
    async fn run_actions(
        &self,
        st: &EngineState,
        segment: &Segment,
        transition: &TransitionSpec,
    ) -> Vec<ScheduleEvent> {
        let mut actions = Vec::new();
        let mut notices = Vec::new();

        if let Some(scene) = &segment.switcher_scene {
            actions.push(Action::Switcher(SwitcherCommand::SetTransition {
                kind: transition.kind.clone(),
                duration_ms: transition.duration_ms,
            }));
            actions.push(Action::Switcher(SwitcherCommand::SetScene {
                scene: scene.clone(),
            }));
        }

        if segment.segment_type.triggers_graphic() {
            actions.push(Action::Graphic);
            notices.push(ScheduleEvent::GraphicTriggered {
                segment_id: segment.id.clone(),
                graphic_ref: segment.graphic_ref.clone(),
            });
        } else if segment.segment_type == SegmentType::Video {
            if let Some(media) = &segment.media {
                if let Some(file) = &media.file {
                    actions.push(Action::Switcher(SwitcherCommand::SetInputSettings {
                        input: media.input_name.clone(),
                        settings: json!({ "local_file": file }),
                    }));
                }
                actions.push(Action::Switcher(SwitcherCommand::RestartMedia {
                    input: media.input_name.clone(),
                }));
                notices.push(ScheduleEvent::MediaTriggered {
                    segment_id: segment.id.clone(),
                    input_name: media.input_name.clone(),
                    file: media.file.clone(),
                });
            }
        } else if segment.is_hold() {
            notices.push(ScheduleEvent::HoldStarted {
                segment_id: segment.id.clone(),
                min_duration_ms: segment.min_duration_ms(),
                max_duration_ms: segment.max_duration_ms(),
            });
        }

        for audio in &segment.audio_overrides {
            if let Some(volume) = audio.volume {
                actions.push(Action::Switcher(SwitcherCommand::SetInputVolume {
                    input: audio.input_name.clone(),
                    volume_db: volume_to_db(volume),
                }));
            }
            if let Some(muted) = audio.muted {
                actions.push(Action::Switcher(SwitcherCommand::SetInputMute {
                    input: audio.input_name.clone(),
                    muted,
                }));
            }
        }

        if let Some(cue_ref) = &segment.audio_cue_ref {
            match st.show.audio_cue(cue_ref) {
                Some(cue) => {
                    if let Some(file) = &cue.file {
                        actions.push(Action::Switcher(SwitcherCommand::SetInputSettings {
                            input: cue.input_name.clone(),
                            settings: json!({ "local_file": file }),
                        }));
                    }
                    if let Some(volume) = cue.volume {
                        actions.push(Action::Switcher(SwitcherCommand::SetInputVolume {
                            input: cue.input_name.clone(),
                            volume_db: volume_to_db(volume),
                        }));
                    }
                    actions.push(Action::Switcher(SwitcherCommand::RestartMedia {
                        input: cue.input_name.clone(),
                    }));
                    notices.push(ScheduleEvent::AudioCueTriggered {
                        segment_id: segment.id.clone(),
                        cue_ref: cue_ref.clone(),
                        input_name: cue.input_name.clone(),
                    });
                }
                None => {
                    tracing::warn!(
                        show_id = %self.show_id,
                        segment_id = %segment.id,
                        cue_ref = %cue_ref,
                        "Unknown audio cue"
                    );
                }
            }
        }

        if st.rehearsal {
            tracing::debug!(
                show_id = %self.show_id,
                segment_id = %segment.id,
                skipped = actions.len(),
                "Rehearsal: outbound calls skipped"
            );
            return notices;
        }

        let connection = if actions.iter().any(|a| matches!(a, Action::Switcher(_))) {
            self.pool.get_connection(&self.show_id).await
        } else {
            None
        };
        for action in actions {
            match action {
                Action::Switcher(command) => {
                    self.send_command(connection.as_deref(), &segment.id, command)
                        .await;
                }
                Action::Graphic => self.trigger_graphic(segment).await,
            }
        }

        notices
    }

    async fn trigger_graphic(&self, segment: &Segment) {
        if let Some(graphics) = &self.graphics {
            if let Err(e) = graphics.trigger(&self.show_id, segment).await {
                self.command_failed("trigger_graphic", &segment.id, e.to_string());
            }
        }
    }

    async fn send_command(
        &self,
        connection: Option<&SwitcherConnection>,
        segment_id: &str,
        command: SwitcherCommand,
    ) {
        let operation = command.operation();
        let result = match connection {
            Some(connection) => connection.send(command).await,
            None => Err(SwitcherError::not_connected(&self.show_id)),
        };

        if let Err(e) = result {
            self.command_failed(operation, segment_id, e.to_string());
        }
    }

    fn command_failed(&self, operation: &str, segment_id: &str, message: String) {
        tracing::warn!(
            show_id = %self.show_id,
            segment_id,
            operation,
            error = %message,
            "Segment command failed"
        );
        metrics::inc_command_failures(&self.show_id, operation);
        self.emit(ScheduleEvent::CommandFailed {
            operation: operation.to_string(),
            segment_id: segment_id.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, AudioCue};
    use crate::models::{AudioOverride, MediaTarget};
    use crate::scheduler::graphics::GraphicsError;
    use crate::switcher::{MemoryConnector, PoolConfig};
    use std::collections::HashMap;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn fixture(show: ShowConfig) -> (Arc<SegmentScheduler>, MemoryConnector) {
        let connector = MemoryConnector::new();
        let pool = SwitcherConnectionPool::new(PoolConfig::default(), Arc::new(connector.clone()));
        pool.connect(&show.id, "memory").await.unwrap();

        let scheduler = SegmentScheduler::new(show, SchedulerConfig::default(), pool, None);
        (scheduler, connector)
    }

    fn three_segments() -> ShowConfig {
        ShowConfig::new("show").with_segments(vec![
            Segment::new("a", "A", SegmentType::Live).with_duration(5),
            Segment::new("b", "B", SegmentType::Live).with_duration(5),
            Segment::new("c", "C", SegmentType::Static),
        ])
    }

    fn drain(rx: &mut broadcast::Receiver<ScheduleEvent>) -> Vec<ScheduleEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }

    fn names(events: &[ScheduleEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(ScheduleEvent::name)
            .filter(|n| *n != "tick")
            .collect()
    }

    async fn current_id(scheduler: &SegmentScheduler) -> Option<String> {
        scheduler.get_state().await.current_segment.map(|s| s.id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_segments() {
        let (scheduler, _) = fixture(ShowConfig::new("show")).await;
        assert_eq!(scheduler.start().await, Err(SchedulerError::NoSegments));
        assert_eq!(scheduler.lifecycle().await, Lifecycle::Stopped);
        assert_eq!(scheduler.get_state().await.current_segment_index, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_happens_once_per_segment() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("b"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("c"));

        // Open-ended segment stays on air
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("c"));

        let history = scheduler.history().await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.reason == HistoryReason::AutoAdvance));
        assert_eq!(history[0].segment_id, "a");
        assert_eq!(history[0].actual_duration_ms, 5000);
        assert!(scheduler.override_log().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_advance_is_not_repeated_by_tick() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        scheduler.advance("director").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        // b just started, so the tick at 5s must not move past it
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("b"));
        let history = scheduler.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, HistoryReason::ManualAdvance);
        assert_eq!(history[0].actor.as_deref(), Some("director"));

        let overrides = scheduler.override_log().await;
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].kind, OverrideKind::Advance);
        assert_eq!(overrides[0].to_segment_id.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outgoing_completes_before_incoming_activates() {
        let (scheduler, _) = fixture(three_segments()).await;
        let mut rx = scheduler.subscribe();
        scheduler.start().await.unwrap();
        scheduler.advance("td").await.unwrap();

        assert_eq!(
            names(&drain(&mut rx)),
            vec![
                "show_started",
                "segment_activated",
                "graphic_triggered",
                "segment_completed",
                "segment_activated",
                "graphic_triggered",
                "override_recorded",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundaries() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();

        assert_eq!(
            scheduler.previous("td").await,
            Err(SchedulerError::at_first("a"))
        );

        scheduler.go_to_segment("c", "td").await.unwrap();
        assert_eq!(
            scheduler.advance("td").await,
            Err(SchedulerError::at_last("c"))
        );

        scheduler.previous("td").await.unwrap();
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_jump_changes_nothing() {
        let (scheduler, connector) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();
        let commands_before = connector.commands().len();

        let err = scheduler.go_to_segment("nope", "td").await.unwrap_err();
        assert_eq!(err, SchedulerError::segment_not_found("nope"));

        let state = scheduler.get_state().await;
        assert_eq!(state.current_segment_index, 0);
        assert_eq!(state.history_count, 0);
        assert_eq!(state.override_count, 0);
        assert_eq!(connector.commands().len(), commands_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_minimum_and_maximum() {
        let show = ShowConfig::new("show").with_segments(vec![
            Segment::new("hold", "Judges", SegmentType::Hold)
                .with_min_duration(10)
                .with_max_duration(20),
            Segment::new("next", "Next", SegmentType::Live),
        ]);
        let (scheduler, _) = fixture(show).await;
        let mut rx = scheduler.subscribe();
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        let err = scheduler.advance("td").await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::HoldMinimumNotMet {
                min_duration_ms: 10_000,
                ..
            }
        ));
        assert!(scheduler.get_state().await.hold_locked);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let events = drain(&mut rx);
        let overruns = events
            .iter()
            .filter(|e| matches!(e, ScheduleEvent::HoldMaxReached { .. }))
            .count();
        assert_eq!(overruns, 1);

        // Holds never advance on their own
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("hold"));
        assert!(!scheduler.get_state().await.hold_locked);

        scheduler.advance("td").await.unwrap();
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("next"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_completion() {
        let show = ShowConfig::new("show").with_segments(vec![
            Segment::new("a", "A", SegmentType::Static).with_duration(2),
            Segment::new("b", "B", SegmentType::Static).with_duration(2),
        ]);
        let (scheduler, _) = fixture(show).await;
        let mut rx = scheduler.subscribe();
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let events = drain(&mut rx);
        let tail: Vec<_> = names(&events).into_iter().rev().take(3).collect();
        assert_eq!(tail, vec!["show_stopped", "show_complete", "segment_completed"]);
        assert_eq!(
            names(&events).iter().filter(|n| **n == "show_complete").count(),
            1
        );

        let state = scheduler.get_state().await;
        assert_eq!(state.lifecycle, Lifecycle::Stopped);
        assert_eq!(state.current_segment_index, -1);

        let history = scheduler.history().await;
        assert_eq!(history.last().unwrap().reason, HistoryReason::NaturalCompletion);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_records_completion() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();
        scheduler.stop("td").await.unwrap();

        let history = scheduler.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, HistoryReason::Completed);
        assert_eq!(scheduler.override_log().await[0].kind, OverrideKind::Stop);

        // Stopped schedulers ignore further manual calls
        scheduler.advance("td").await.unwrap();
        scheduler.stop("td").await.unwrap();
        assert_eq!(scheduler.history().await.len(), 1);
        assert_eq!(scheduler.get_state().await.current_segment_index, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_elapsed_time() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        scheduler.pause("td").await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        let state = scheduler.get_state().await;
        assert_eq!(state.lifecycle, Lifecycle::Paused);
        assert_eq!(state.current_segment.unwrap().id, "a");
        assert_eq!(state.elapsed_ms, 3000);

        scheduler.resume("td").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(current_id(&scheduler).await.as_deref(), Some("b"));

        let kinds: Vec<_> = scheduler
            .override_log()
            .await
            .iter()
            .map(|o| o.kind)
            .collect();
        assert_eq!(kinds, vec![OverrideKind::Pause, OverrideKind::Resume]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_commands() {
        let mut cues = HashMap::new();
        cues.insert(
            "sting".to_string(),
            AudioCue {
                input_name: "SFX".into(),
                file: Some("/media/sting.wav".into()),
                volume: None,
            },
        );

        let show = ShowConfig::new("show")
            .with_audio(AudioConfig { cues })
            .with_segments(vec![
                Segment::new("open", "Open", SegmentType::Video)
                    .with_scene("VT")
                    .with_transition(TransitionSpec::new("Fade", 300))
                    .with_media(MediaTarget {
                        input_name: "VT1".into(),
                        file: Some("/media/open.mp4".into()),
                    })
                    .with_audio_override(AudioOverride {
                        input_name: "Mic".into(),
                        volume: None,
                        muted: Some(true),
                    })
                    .with_audio_cue("sting"),
            ]);
        let (scheduler, connector) = fixture(show).await;
        scheduler.start().await.unwrap();

        let ops: Vec<_> = connector
            .commands()
            .into_iter()
            .map(|(_, c)| c.operation())
            .collect();
        assert_eq!(
            ops,
            vec![
                "set_transition",
                "set_scene",
                "set_input_settings",
                "restart_media",
                "set_input_mute",
                "set_input_settings",
                "restart_media",
            ]
        );
        assert_eq!(connector.scenes(), vec!["VT".to_string()]);
    }

    /// Notes how many switcher commands had gone out each time it fired
    struct CountingGraphics {
        connector: MemoryConnector,
        fired_after: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl GraphicsController for CountingGraphics {
        async fn trigger(&self, _show_id: &str, _segment: &Segment) -> Result<(), GraphicsError> {
            let sent = self.connector.commands().len();
            self.fired_after.lock().unwrap().push(sent);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graphic_fires_between_scene_and_audio() {
        let mut cues = HashMap::new();
        cues.insert(
            "sting".to_string(),
            AudioCue {
                input_name: "SFX".into(),
                file: None,
                volume: None,
            },
        );
        let show = ShowConfig::new("show")
            .with_audio(AudioConfig { cues })
            .with_segments(vec![Segment::new("open", "Open", SegmentType::Live)
                .with_scene("Wide")
                .with_audio_override(AudioOverride {
                    input_name: "Mic".into(),
                    volume: Some(0.5),
                    muted: Some(false),
                })
                .with_audio_cue("sting")]);

        let connector = MemoryConnector::new();
        let pool = SwitcherConnectionPool::new(PoolConfig::default(), Arc::new(connector.clone()));
        pool.connect("show", "memory").await.unwrap();
        let graphics = Arc::new(CountingGraphics {
            connector: connector.clone(),
            fired_after: std::sync::Mutex::new(Vec::new()),
        });
        let scheduler = SegmentScheduler::new(
            show,
            SchedulerConfig::default(),
            pool,
            Some(graphics.clone() as Arc<dyn GraphicsController>),
        );
        let mut rx = scheduler.subscribe();
        scheduler.start().await.unwrap();

        assert_eq!(*graphics.fired_after.lock().unwrap(), vec![2]);
        let ops: Vec<_> = connector
            .commands()
            .into_iter()
            .map(|(_, c)| c.operation())
            .collect();
        assert_eq!(
            ops,
            vec![
                "set_transition",
                "set_scene",
                "set_input_volume",
                "set_input_mute",
                "restart_media",
            ]
        );
        assert_eq!(
            names(&drain(&mut rx)),
            vec![
                "show_started",
                "segment_activated",
                "graphic_triggered",
                "audio_cue_triggered",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehearsal_skips_commands() {
        let show = ShowConfig::new("show")
            .with_segments(vec![Segment::new("a", "A", SegmentType::Live).with_scene("Cam 1")]);
        let (scheduler, connector) = fixture(show).await;
        let mut rx = scheduler.subscribe();

        scheduler.set_rehearsal(true).await;
        scheduler.start().await.unwrap();

        assert!(connector.commands().is_empty());
        assert!(names(&drain(&mut rx)).contains(&"segment_activated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_connection_reports_command_failure() {
        let pool =
            SwitcherConnectionPool::new(PoolConfig::default(), Arc::new(MemoryConnector::new()));
        let show = ShowConfig::new("show")
            .with_segments(vec![Segment::new("a", "A", SegmentType::Live).with_scene("Cam 1")]);
        let scheduler = SegmentScheduler::new(show, SchedulerConfig::default(), pool, None);
        let mut rx = scheduler.subscribe();

        scheduler.start().await.unwrap();

        let failures: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ScheduleEvent::CommandFailed { operation, .. } => Some(operation),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["set_transition", "set_scene"]);
        assert_eq!(scheduler.lifecycle().await, Lifecycle::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_keeps_current_segment() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();
        scheduler.advance("td").await.unwrap();

        // Insert a segment ahead of the current one
        let mut show = three_segments();
        show.segments
            .insert(0, Segment::new("pre", "Pre", SegmentType::Static));
        scheduler.update_config(show).await.unwrap();

        let state = scheduler.get_state().await;
        assert_eq!(state.current_segment.unwrap().id, "b");
        assert_eq!(state.current_segment_index, 2);
        assert!(!state.current_segment_deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_with_deleted_current_segment() {
        let (scheduler, _) = fixture(three_segments()).await;
        let mut rx = scheduler.subscribe();
        scheduler.start().await.unwrap();
        scheduler.advance("td").await.unwrap();

        let mut show = three_segments();
        show.segments.retain(|s| s.id != "b");
        scheduler.update_config(show).await.unwrap();

        let state = scheduler.get_state().await;
        assert!(state.current_segment_deleted);
        assert_eq!(state.current_segment.unwrap().id, "b");
        assert_eq!(state.next_segment.unwrap().id, "c");
        assert!(names(&drain(&mut rx)).contains(&"current_segment_deleted"));

        scheduler.advance("td").await.unwrap();
        let state = scheduler.get_state().await;
        assert_eq!(state.current_segment.unwrap().id, "c");
        assert!(!state.current_segment_deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_rejects_empty_show_while_running() {
        let (scheduler, _) = fixture(three_segments()).await;
        scheduler.start().await.unwrap();

        let err = scheduler
            .update_config(ShowConfig::new("show"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig { .. }));
        assert_eq!(scheduler.get_state().await.segment_count, 3);
    }
}
