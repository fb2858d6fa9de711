use std::sync::Arc;

use deeptime_protocol::{Event, Rect};

use crate::config::LayoutConfig;
use crate::lanes::LaneAssignment;
use crate::viewport::Viewport;

/// An event placed on screen for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutEvent {
    pub event: Arc<Event>,
    pub lane: usize,
    pub bounds: Rect,
}

/// Screen rectangle of `event` in `lane`, or `None` when the event is
/// entirely outside the viewport.
///
/// Lanes stack downward from the time axis, lane 0 nearest it. Spans are
/// clipped to the canvas and then widened to at least `min_span_width`;
/// point events are a fixed-width marker centered on their instant.
pub fn event_bounds(
    event: &Event,
    lane: usize,
    viewport: &Viewport,
    config: &LayoutConfig,
) -> Option<Rect> {
    if !viewport.contains_range(&event.start, event.extent_end()) {
        return None;
    }

    let x = viewport.time_to_x(&event.start);
    let y = config.axis_height + lane as f64 * (config.lane_height + config.lane_gap);

    let rect = match &event.end {
        Some(end) => {
            let w = viewport.scale.time_to_px(&(end - &event.start));
            let clamped_x = x.max(0.0);
            let clamped_w = (x + w).min(f64::from(viewport.canvas_width)) - clamped_x;
            Rect::new(
                clamped_x,
                y,
                clamped_w.max(config.min_span_width),
                config.lane_height,
            )
        }
        None => {
            let w = config.point_event_width;
            Rect::new(x - w / 2.0, y, w, config.lane_height)
        }
    };
    Some(rect)
}

/// Lay out every visible event. Events the lane assignment does not know
/// about yet (e.g. while a background layout is in flight) sit in lane 0.
pub fn layout_events(
    events: &[Arc<Event>],
    lanes: &LaneAssignment,
    viewport: &Viewport,
    config: &LayoutConfig,
) -> Vec<LaidOutEvent> {
    events
        .iter()
        .filter_map(|event| {
            let lane = lanes.lane(&event.id).unwrap_or(0);
            event_bounds(event, lane, viewport, config).map(|bounds| LaidOutEvent {
                event: Arc::clone(event),
                lane,
                bounds,
            })
        })
        .collect()
}
