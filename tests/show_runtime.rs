//! End-to-end tests for a running show
//!
//! These tests drive a full [`ShowRuntime`] against an in-memory switcher:
//! - Timed segments advancing on their own
//! - Operator overrides and boundaries
//! - Camera failure, fallback and recovery
//! - Rehearsal mode

mod common;

use common::{clean, create_test_show, drain_names, memory_pool, settle, ScriptedStats};
use showrunner::config::{AppConfig, ShowConfig};
use showrunner::error::Error;
use showrunner::models::{Segment, SegmentType};
use showrunner::runtime::{ShowRegistry, ShowRuntime};
use showrunner::scheduler::{HistoryReason, Lifecycle, SchedulerError};
use std::sync::Arc;
use std::time::Duration;

const SWITCHER: &str = "ws://switcher.local:4455";

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_show_runs_through_timed_segments() {
    let (connector, pool) = memory_pool();
    let registry = ShowRegistry::with_pool(AppConfig::default(), pool);
    let show = registry
        .load(create_test_show("finals").with_switcher(SWITCHER))
        .await
        .unwrap();

    let mut events = show.scheduler().subscribe();
    show.start_show().await.unwrap();

    let names = drain_names(&mut events);
    assert_eq!(names.first(), Some(&"show_started"));
    assert!(names.contains(&"segment_activated"));
    assert_eq!(connector.scenes(), vec!["Wide"]);

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let state = show.scheduler().get_state().await;
    assert_eq!(state.current_segment.unwrap().id, "vault");

    tokio::time::sleep(Duration::from_secs(20)).await;
    let state = show.scheduler().get_state().await;
    assert_eq!(state.current_segment.unwrap().id, "break");
    assert_eq!(connector.scenes(), vec!["Wide", "Vault", "Standby"]);

    // Untimed break holds until an operator moves on
    tokio::time::sleep(Duration::from_secs(120)).await;
    let state = show.scheduler().get_state().await;
    assert_eq!(state.current_segment.unwrap().id, "break");
    assert_eq!(state.lifecycle, Lifecycle::Running);

    let history = show.scheduler().history().await;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.reason == HistoryReason::AutoAdvance));
    assert_eq!(history[0].actual_duration_ms, 10_000);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_operator_overrides_are_logged() {
    let (connector, pool) = memory_pool();
    let registry = ShowRegistry::with_pool(AppConfig::default(), pool);
    let show = registry
        .load(create_test_show("finals").with_switcher(SWITCHER))
        .await
        .unwrap();
    show.start_show().await.unwrap();

    show.scheduler().go_to_segment("break", "director").await.unwrap();
    let err = show.scheduler().advance("director").await.unwrap_err();
    assert!(matches!(err, SchedulerError::AtLastSegment { .. }));

    show.scheduler().previous("td").await.unwrap();
    assert_eq!(
        show.scheduler().get_state().await.current_segment.unwrap().id,
        "vault"
    );

    let log = show.scheduler().override_log().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].actor, "director");
    assert_eq!(log[0].to_segment_id.as_deref(), Some("break"));
    assert_eq!(log[1].actor, "td");

    assert_eq!(connector.scenes(), vec!["Wide", "Standby", "Vault"]);

    show.scheduler().stop("director").await.unwrap();
    assert_eq!(show.scheduler().lifecycle().await, Lifecycle::Stopped);
    assert_eq!(show.summary().await.current_segment_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_hold_gates_the_show_until_minimum_met() {
    let (connector, pool) = memory_pool();
    let registry = ShowRegistry::with_pool(AppConfig::default(), pool);
    let show = registry
        .load(
            ShowConfig::new("finals")
                .with_switcher(SWITCHER)
                .with_segments(vec![
                    Segment::new("a", "A", SegmentType::Live)
                        .with_duration(5)
                        .with_scene("S1"),
                    Segment::new("b", "B", SegmentType::Hold).with_min_duration(10),
                    Segment::new("c", "C", SegmentType::Live)
                        .with_duration(3)
                        .with_scene("S3"),
                ]),
        )
        .await
        .unwrap();
    let scheduler = show.scheduler();

    scheduler.start().await.unwrap();
    assert_eq!(scheduler.get_state().await.current_segment.unwrap().id, "a");

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(scheduler.get_state().await.current_segment.unwrap().id, "b");

    let err = scheduler.advance("director").await.unwrap_err();
    assert!(matches!(err, SchedulerError::HoldMinimumNotMet { .. }));
    assert_eq!(scheduler.get_state().await.current_segment.unwrap().id, "b");

    tokio::time::sleep(Duration::from_secs(10)).await;
    let mut events = scheduler.subscribe();
    scheduler.advance("director").await.unwrap();
    assert_eq!(scheduler.get_state().await.current_segment.unwrap().id, "c");

    tokio::time::sleep(Duration::from_secs(4)).await;
    let names = drain_names(&mut events);
    assert_eq!(names.iter().filter(|n| **n == "show_complete").count(), 1);
    assert_eq!(scheduler.lifecycle().await, Lifecycle::Stopped);
    assert_eq!(connector.scenes(), vec!["S1", "S3"]);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rehearsal_sends_nothing() {
    let (connector, pool) = memory_pool();
    let mut settings = AppConfig::default();
    settings.scheduler.rehearsal = true;

    let registry = ShowRegistry::with_pool(settings, pool);
    let show = registry
        .load(create_test_show("finals").with_switcher(SWITCHER))
        .await
        .unwrap();
    show.start_show().await.unwrap();
    show.scheduler().advance("director").await.unwrap();

    assert!(show.scheduler().is_rehearsal().await);
    assert!(connector.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_show() {
    let (_connector, pool) = memory_pool();
    let registry = ShowRegistry::with_pool(AppConfig::default(), pool);
    assert!(matches!(
        registry.get("finals").await,
        Err(Error::ShowNotFound(_))
    ));
}

// ============================================================================
// Camera Failover
// ============================================================================

async fn monitored_show() -> (
    showrunner::switcher::MemoryConnector,
    Arc<ScriptedStats>,
    Arc<ShowRuntime>,
) {
    let (connector, pool) = memory_pool();
    let stats = Arc::new(ScriptedStats::default());
    let show = ShowRuntime::new(
        create_test_show("finals").with_switcher(SWITCHER),
        &AppConfig::default(),
        pool,
        stats.clone(),
        None,
    );
    show.activate().await;
    show.start_show().await.unwrap();

    stats.set(vec![clean("9001"), clean("9002")]);
    show.health().poll_health().await;
    settle().await;
    connector.clear_commands();

    (connector, stats, show)
}

#[tokio::test(start_paused = true)]
async fn test_failed_camera_falls_back_and_restores() {
    let (connector, stats, show) = monitored_show().await;

    stats.set(vec![clean("9002")]);
    show.health().poll_health().await;
    settle().await;

    let record = show.fallback().get_fallback("cam-vt").await.unwrap();
    assert_eq!(record.fallback_camera_id(), Some("cam-wide"));
    assert_eq!(record.segment_id.as_deref(), Some("intro"));
    assert_eq!(connector.scenes(), vec!["Single - Wide Cam"]);

    // Feed back, but recovery needs a clean streak first
    stats.set(vec![clean("9001"), clean("9002")]);
    show.health().poll_health().await;
    settle().await;
    assert!(show.fallback().get_fallback("cam-vt").await.is_some());

    tokio::time::sleep(Duration::from_secs(6)).await;
    show.health().poll_health().await;
    settle().await;

    assert!(show.fallback().active_fallbacks().await.is_empty());
    assert_eq!(
        connector.scenes(),
        vec!["Single - Wide Cam", "Single - Vault Cam"]
    );

    show.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_all_cameras_down_goes_to_standby() {
    let (connector, stats, show) = monitored_show().await;

    stats.set(Vec::new());
    show.health().poll_health().await;
    settle().await;

    let fallbacks = show.fallback().active_fallbacks().await;
    assert_eq!(fallbacks.len(), 2);
    assert!(fallbacks.iter().all(|f| f.fallback_camera_id().is_none()));
    assert_eq!(connector.scenes().last().map(String::as_str), Some("BRB"));

    show.shutdown().await;
}
