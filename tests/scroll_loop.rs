mod common;

use std::sync::Arc;
use std::time::Duration;

use chatscroll::{
    ScrollConfig, ScrollController, ScrollDirection, ScrollLoop, ScrollRequest, SessionStatus,
    StopReason, TerminationReason,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use chatscroll::Position;
use common::{
    distinct_frames, fast_config, noise_frame, shared, FailingExtractor, FixedExtractor,
    FixedPointer, ScriptedController, CHAT_AREA,
};

fn scroll_loop(config: ScrollConfig, controller: Arc<ScriptedController>) -> ScrollLoop {
    ScrollLoop::new(config, controller)
        .unwrap()
        .with_rng(StdRng::seed_from_u64(42))
}

fn termination(scroll_loop: &ScrollLoop) -> Option<TerminationReason> {
    scroll_loop.session().and_then(|session| session.termination)
}

#[tokio::test]
async fn single_iteration_run_captures_once() {
    let controller = shared(ScriptedController::new(distinct_frames(2)));
    let mut sl = scroll_loop(fast_config(), controller.clone());

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 1)).await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(states[0].iteration, 1);
    assert!(states[0].has_image());
    assert_eq!(states[0].position, CHAT_AREA.center());
    assert_eq!(states[0].window.as_ref().map(|w| w.title.as_str()), Some("Chat"));

    let session = sl.session().unwrap();
    assert!(session.ended_at.is_some());
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.termination, Some(TerminationReason::MaxIterations));
    assert_eq!(controller.scroll_calls().len(), 1);
}

#[tokio::test]
async fn identical_frames_stall_after_three_iterations() {
    let controller = shared(ScriptedController::new(vec![noise_frame(7)]));
    let mut sl = scroll_loop(fast_config(), controller);

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 50)).await.unwrap();

    assert_eq!(states.len(), 3);
    assert_eq!(termination(&sl), Some(TerminationReason::ContentStalled));
}

#[tokio::test]
async fn stall_count_restarts_when_content_changes() {
    let frames = [noise_frame(11), noise_frame(12), noise_frame(13)]
        .into_iter()
        .flat_map(|frame| [frame.clone(), frame])
        .collect();
    let controller = shared(ScriptedController::new(frames));
    let mut sl = scroll_loop(fast_config(), controller);

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 6)).await.unwrap();

    assert_eq!(states.len(), 6);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
    assert_eq!(sl.session().unwrap().consecutive_no_change, 1);
}

#[tokio::test]
async fn pointer_in_corner_interrupts_the_run() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller.clone())
        .with_pointer_probe(Arc::new(FixedPointer(Position::new(1915, 2))));

    let states = sl.run(ScrollRequest::new(ScrollDirection::Down, 10)).await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(
        termination(&sl),
        Some(TerminationReason::StopCondition(StopReason::UserInterrupt))
    );
    assert!(controller.scroll_calls().is_empty());
}

#[tokio::test]
async fn pointer_away_from_corners_lets_the_run_continue() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller)
        .with_pointer_probe(Arc::new(FixedPointer(Position::new(960, 540))));

    let states = sl.run(ScrollRequest::new(ScrollDirection::Down, 3)).await.unwrap();

    assert_eq!(states.len(), 3);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
}

#[tokio::test]
async fn changing_frames_run_to_the_iteration_limit() {
    let controller = shared(ScriptedController::new(distinct_frames(5)));
    let mut sl = scroll_loop(fast_config(), controller.clone());

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 5)).await.unwrap();

    let iterations: Vec<u64> = states.iter().map(|s| s.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3, 4, 5]);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
    assert_eq!(controller.scroll_calls().len(), 5);
}

#[tokio::test]
async fn target_text_stops_on_the_first_iteration() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller.clone())
        .with_extractor(Arc::new(FixedExtractor::new(&["今天天气很好，我们一起去公园散步吧"])));

    let request = ScrollRequest::new(ScrollDirection::Up, 10).with_target("公园");
    let states = sl.run(request).await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(states[0].message_count, 1);
    assert!(states[0].content_summary.contains("公园"));
    assert_eq!(
        termination(&sl),
        Some(TerminationReason::StopCondition(StopReason::TargetContentMatched))
    );
    assert!(controller.scroll_calls().is_empty());
}

#[tokio::test]
async fn top_edge_stops_upward_scans_only() {
    let controller = shared(ScriptedController::new(distinct_frames(3)).at_top());
    let mut sl = scroll_loop(fast_config(), controller.clone());
    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(
        termination(&sl),
        Some(TerminationReason::StopCondition(StopReason::EdgeReached))
    );

    let controller = shared(ScriptedController::new(distinct_frames(3)).at_top());
    let mut sl = scroll_loop(fast_config(), controller);
    let states = sl.run(ScrollRequest::new(ScrollDirection::Down, 3)).await.unwrap();
    assert_eq!(states.len(), 3);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
}

#[tokio::test]
async fn edge_stop_can_be_disabled() {
    let controller = shared(ScriptedController::new(distinct_frames(3)).at_top());
    let mut sl = scroll_loop(fast_config(), controller);
    let request = ScrollRequest::new(ScrollDirection::Up, 3).with_stop_at_edges(false);
    let states = sl.run(request).await.unwrap();
    assert_eq!(states.len(), 3);
}

#[tokio::test]
async fn scroll_sign_follows_direction() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller.clone());
    sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();
    assert!(controller.scroll_calls().iter().all(|(_, amount)| *amount > 0));

    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller.clone());
    sl.run(ScrollRequest::new(ScrollDirection::Down, 3)).await.unwrap();
    assert!(controller.scroll_calls().iter().all(|(_, amount)| *amount < 0));
}

#[tokio::test]
async fn missing_chat_area_fails_before_capturing() {
    let controller = shared(ScriptedController::new(distinct_frames(2)).without_bounds());
    let mut sl = scroll_loop(fast_config(), controller.clone());

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 5)).await.unwrap();

    assert!(states.is_empty());
    let session = sl.session().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.termination, Some(TerminationReason::InitialPositionFailed));
    assert_eq!(controller.capture_calls(), 0);
}

#[tokio::test]
async fn single_scroll_failure_is_recovered() {
    let controller = shared(ScriptedController::new(distinct_frames(3)).failing_scrolls(1));
    let mut sl = scroll_loop(fast_config(), controller.clone());

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();

    assert_eq!(states.len(), 3);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
    assert_eq!(controller.scroll_calls().len(), 3);
}

#[tokio::test]
async fn repeated_scroll_failure_ends_the_run() {
    let controller = shared(ScriptedController::new(distinct_frames(3)).failing_scrolls(2));
    let mut sl = scroll_loop(fast_config(), controller);

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 5)).await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(termination(&sl), Some(TerminationReason::ScrollFailure));
    assert_eq!(sl.session().unwrap().status, SessionStatus::Completed);
}

#[tokio::test]
async fn extraction_failure_degrades_to_empty_messages() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller).with_extractor(Arc::new(FailingExtractor));

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();

    assert_eq!(states.len(), 3);
    assert!(states.iter().all(|s| s.message_count == 0 && s.content_summary.is_empty()));
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
}

#[tokio::test]
async fn only_recent_images_are_retained() {
    let controller = shared(ScriptedController::new(distinct_frames(6)));
    let mut sl = scroll_loop(fast_config(), controller);

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 6)).await.unwrap();

    let with_images: Vec<u64> = states
        .iter()
        .filter(|s| s.has_image())
        .map(|s| s.iteration)
        .collect();
    assert_eq!(with_images, vec![4, 5, 6]);
}

#[tokio::test]
async fn time_limit_ends_the_run_early() {
    let config = ScrollConfig {
        scroll_interval_range_ms: (20, 20),
        ..fast_config()
    };
    let controller = shared(ScriptedController::new(distinct_frames(50)));
    let mut sl = scroll_loop(config, controller);

    let request = ScrollRequest::new(ScrollDirection::Up, 50)
        .with_max_duration(Duration::from_millis(30));
    let states = sl.run(request).await.unwrap();

    assert!(!states.is_empty() && states.len() < 50, "{}", states.len());
    assert_eq!(termination(&sl), Some(TerminationReason::Timeout));
}

#[tokio::test]
async fn pre_cancelled_loop_captures_nothing() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller);
    sl.cancel_token().cancel();

    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();

    assert!(states.is_empty());
    assert_eq!(termination(&sl), Some(TerminationReason::Cancelled));

    sl.reset();
    assert!(sl.session().is_none());
    let states = sl.run(ScrollRequest::new(ScrollDirection::Up, 2)).await.unwrap();
    assert_eq!(states.len(), 2);
}

#[tokio::test]
async fn controller_stop_cancels_a_running_loop() {
    let config = ScrollConfig {
        scroll_interval_range_ms: (200, 200),
        ..fast_config()
    };
    let controller = shared(ScriptedController::new(distinct_frames(50)));
    let sl = scroll_loop(config, controller);

    let mut task = ScrollController::new();
    task.start(sl, ScrollRequest::new(ScrollDirection::Up, 50)).unwrap();
    assert!(task.is_active());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = task.stop().await.unwrap().unwrap();
    let states = outcome.states.unwrap();
    assert!(!states.is_empty() && states.len() < 50);
    assert_eq!(termination(&outcome.scroll_loop), Some(TerminationReason::Cancelled));
    assert!(!task.is_active());
    assert!(task.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn controller_rejects_a_second_start() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut task = ScrollController::new();
    task.start(
        scroll_loop(fast_config(), controller.clone()),
        ScrollRequest::new(ScrollDirection::Up, 2),
    )
    .unwrap();
    assert!(task
        .start(
            scroll_loop(fast_config(), controller),
            ScrollRequest::new(ScrollDirection::Up, 2),
        )
        .is_err());

    let outcome = task.join().await.unwrap().unwrap();
    assert_eq!(outcome.states.unwrap().len(), 2);
}

#[tokio::test]
async fn zero_iterations_is_rejected() {
    let controller = shared(ScriptedController::new(distinct_frames(1)));
    let mut sl = scroll_loop(fast_config(), controller);
    assert!(sl.run(ScrollRequest::new(ScrollDirection::Up, 0)).await.is_err());
    assert!(sl.session().is_none());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let controller = shared(ScriptedController::new(distinct_frames(1)));
    let config = ScrollConfig {
        scroll_distance_range: (0, 10),
        ..ScrollConfig::default()
    };
    assert!(ScrollLoop::new(config, controller).is_err());
}

#[tokio::test]
async fn watchdog_runs_alongside_the_loop() {
    let config = ScrollConfig {
        enable_watchdog: true,
        watchdog_interval_ms: 100,
        ..fast_config()
    };
    let controller = shared(ScriptedController::new(distinct_frames(4)));
    let mut sl = scroll_loop(config, controller);

    let states = sl.run(ScrollRequest::new(ScrollDirection::Down, 4)).await.unwrap();

    assert_eq!(states.len(), 4);
    assert_eq!(termination(&sl), Some(TerminationReason::MaxIterations));
}

#[tokio::test]
async fn statistics_summarize_the_session() {
    let controller = shared(ScriptedController::new(distinct_frames(3)));
    let mut sl = scroll_loop(fast_config(), controller)
        .with_extractor(Arc::new(FixedExtractor::new(&["hi", "there"])));

    sl.run(ScrollRequest::new(ScrollDirection::Up, 3)).await.unwrap();

    let stats = sl.statistics().unwrap();
    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.total_messages, 6);
    assert!((stats.avg_messages_per_iteration - 2.0).abs() < f64::EPSILON);
    assert!(stats.duration_secs >= 0.0);

    let json = serde_json::to_value(&stats).unwrap();
    assert!(json.get("avgMessagesPerIteration").is_some());
}
