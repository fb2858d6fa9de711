use std::sync::Arc;

use deeptime_protocol::Event;
use num_bigint::BigInt;

use crate::scale::RationalScale;

pub const DEFAULT_CLUSTER_THRESHOLD_PX: f64 = 20.0;

/// Several events drawn as one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCluster {
    /// Members in start order.
    pub events: Vec<Arc<Event>>,
    pub count: usize,
    /// Midpoint of the members' screen x-extent.
    pub center_x: f64,
    pub min_time: BigInt,
    /// Latest `end` (or `start` for point events) among the members.
    pub max_time: BigInt,
}

/// One item of a clustered view.
#[derive(Debug, Clone, PartialEq)]
pub enum Clustered {
    Single(Arc<Event>),
    Cluster(EventCluster),
}

impl Clustered {
    pub fn count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Cluster(cluster) => cluster.count,
        }
    }

    pub fn events(&self) -> &[Arc<Event>] {
        match self {
            Self::Single(event) => std::slice::from_ref(event),
            Self::Cluster(cluster) => &cluster.events,
        }
    }
}

/// [`cluster_events_with_threshold`] at [`DEFAULT_CLUSTER_THRESHOLD_PX`].
pub fn cluster_events(
    events: &[Arc<Event>],
    viewport_start: &BigInt,
    scale: &RationalScale,
) -> Vec<Clustered> {
    cluster_events_with_threshold(events, viewport_start, scale, DEFAULT_CLUSTER_THRESHOLD_PX)
}

/// Group events whose screen x (of their start) is within `threshold_px` of
/// the previous member of the running group. Walks events in start order, so
/// a long chain of close neighbours becomes one cluster even if its ends are
/// far apart. Groups of one come back as [`Clustered::Single`].
pub fn cluster_events_with_threshold(
    events: &[Arc<Event>],
    viewport_start: &BigInt,
    scale: &RationalScale,
    threshold_px: f64,
) -> Vec<Clustered> {
    let mut positioned: Vec<(f64, &Arc<Event>)> = events
        .iter()
        .map(|event| (scale.time_to_px(&(&event.start - viewport_start)), event))
        .collect();
    positioned.sort_by(|(_, a), (_, b)| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut out = Vec::new();
    let mut group: Vec<(f64, &Arc<Event>)> = Vec::new();

    for (x, event) in positioned {
        let split = group
            .last()
            .is_some_and(|(last_x, _)| x - last_x > threshold_px);
        if split {
            out.push(finish_group(&group));
            group.clear();
        }
        group.push((x, event));
    }
    if !group.is_empty() {
        out.push(finish_group(&group));
    }
    out
}

fn finish_group(group: &[(f64, &Arc<Event>)]) -> Clustered {
    if let [(_, event)] = group {
        return Clustered::Single(Arc::clone(event));
    }

    let min_x = group.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let max_x = group.iter().map(|(x, _)| *x).fold(f64::NEG_INFINITY, f64::max);
    let min_time = group
        .iter()
        .map(|(_, e)| &e.start)
        .min()
        .cloned()
        .unwrap_or_default();
    let max_time = group
        .iter()
        .map(|(_, e)| e.extent_end())
        .max()
        .cloned()
        .unwrap_or_default();

    Clustered::Cluster(EventCluster {
        events: group.iter().map(|(_, e)| Arc::clone(e)).collect(),
        count: group.len(),
        center_x: (min_x + max_x) / 2.0,
        min_time,
        max_time,
    })
}

/// How far the renderer should blend from the clustered view (0.0) to the
/// fully expanded view (1.0) at the given zoom. Linear between the two
/// thresholds, 0 at or above `macro_threshold`, 1 at or below
/// `meso_threshold`.
pub fn cluster_expansion_factor(
    seconds_per_pixel: f64,
    macro_threshold: f64,
    meso_threshold: f64,
) -> f64 {
    if seconds_per_pixel.is_nan() {
        return 1.0;
    }
    if seconds_per_pixel >= macro_threshold {
        return 0.0;
    }
    if seconds_per_pixel <= meso_threshold {
        return 1.0;
    }
    ((macro_threshold - seconds_per_pixel) / (macro_threshold - meso_threshold)).clamp(0.0, 1.0)
}

/// Circular hit-test against a cluster marker at `(center_x, marker_y)`,
/// boundary included.
pub fn is_point_in_cluster(
    x: f64,
    y: f64,
    cluster: &EventCluster,
    marker_y: f64,
    radius: f64,
) -> bool {
    let dx = x - cluster.center_x;
    let dy = y - marker_y;
    dx * dx + dy * dy <= radius * radius
}
