//! End-to-end: coordinator + background worker thread + frame building.

use std::time::{Duration, Instant};

use deeptime_core::coordinator::{LayoutCoordinator, LayoutState, PollOutcome, ThreadWorker};
use deeptime_core::{FrameHit, LayoutConfig, RationalScale, Viewport, assign_lanes};
use deeptime_protocol::Event;
use num_bigint::BigInt;

const YEAR: i64 = 31_557_600;

fn deep_time_events(count: i64) -> Vec<Event> {
    // Staggered spans reaching back 4 billion years, each overlapping the next.
    let origin = BigInt::from(-4_000_000_000i64) * YEAR;
    (0..count)
        .map(|i| {
            let start = &origin + BigInt::from(i) * 1_000_000 * YEAR;
            let end = &start + BigInt::from(2_500_000) * YEAR;
            Event::span(format!("era{i:04}"), start, end).with_label(format!("Era {i}"))
        })
        .collect()
}

fn worker_coordinator(threshold: usize) -> LayoutCoordinator {
    let config = LayoutConfig {
        worker_threshold: threshold,
        ..LayoutConfig::default()
    };
    let start = BigInt::from(-4_000_000_000i64) * YEAR;
    let viewport = Viewport::new(start, RationalScale::from_seconds_per_pixel(1e14), 1_200);
    let worker = ThreadWorker::spawn().expect("spawn layout worker");
    LayoutCoordinator::new(config, viewport).with_transport(Box::new(worker))
}

fn wait_until_settled(coordinator: &mut LayoutCoordinator) -> Vec<PollOutcome> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut outcomes = Vec::new();
    loop {
        outcomes.extend(coordinator.poll());
        if coordinator.state() != LayoutState::Computing {
            return outcomes;
        }
        assert!(Instant::now() < deadline, "worker never answered");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn worker_lanes_match_synchronous_assignment() {
    let events = deep_time_events(500);
    let expected = assign_lanes(&events);

    let mut coordinator = worker_coordinator(100);
    coordinator.set_events(events);
    assert_eq!(coordinator.state(), LayoutState::Computing);

    let outcomes = wait_until_settled(&mut coordinator);
    assert_eq!(
        outcomes,
        vec![PollOutcome::Applied {
            revision: 1,
            lane_count: expected.lane_count()
        }]
    );
    assert_eq!(*coordinator.lanes(), expected);
}

#[test]
fn rapid_revisions_apply_only_the_last() {
    let mut coordinator = worker_coordinator(10);
    coordinator.set_events(deep_time_events(50));
    let mut viewport = coordinator.viewport().clone();
    for _ in 0..5 {
        viewport.pan_by_pixels(-40.0);
        coordinator.set_viewport(viewport.clone());
    }
    let last = coordinator.revision();
    assert_eq!(last, 6);

    let outcomes = wait_until_settled(&mut coordinator);
    assert_eq!(coordinator.applied_revision(), last);
    assert!(outcomes.iter().all(|outcome| match outcome {
        PollOutcome::Applied { revision, .. } => *revision == last,
        PollOutcome::Superseded { revision } => *revision < last,
        PollOutcome::FellBack { .. } => false,
    }));
}

#[test]
fn frame_from_worker_lanes_supports_hit_testing() {
    let mut coordinator = worker_coordinator(10);
    coordinator.set_events(deep_time_events(40));
    wait_until_settled(&mut coordinator);

    let frame = coordinator.frame();
    assert_eq!(frame.revision, coordinator.revision());
    assert!(!frame.laid_out.is_empty());
    assert!(!frame.ticks.is_empty());
    // 1e14 s/px is far past one year per pixel: fully clustered.
    assert!(frame.is_clustered());

    let lanes = frame.lanes.lane_count();
    assert!(lanes >= 2, "staggered eras overlap pairwise, got {lanes} lanes");

    // The last one drawn in lane 1 sits on top of anything it overlaps.
    let item = frame
        .laid_out
        .iter()
        .rev()
        .find(|item| item.lane == 1)
        .expect("an event in lane 1");
    let (x, y) = (item.bounds.x + item.bounds.w / 2.0, item.bounds.y + item.bounds.h / 2.0);
    match frame.hit_test(x, y) {
        Some(FrameHit::Event(event)) => assert_eq!(event.id, item.event.id),
        Some(FrameHit::Cluster(_)) => unreachable!("lane 1 lies below the cluster markers"),
        None => unreachable!("nothing under ({x}, {y})"),
    }
}

#[test]
fn dropping_worker_handle_joins_thread() {
    let worker = ThreadWorker::spawn().expect("spawn layout worker");
    drop(worker);
}
