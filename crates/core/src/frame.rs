use std::sync::Arc;

use deeptime_protocol::Event;

use crate::cluster::{
    Clustered, EventCluster, cluster_events_with_threshold, cluster_expansion_factor,
    is_point_in_cluster,
};
use crate::config::LayoutConfig;
use crate::labels::{LabelVisibility, TextMeasurer, detect_label_collisions};
use crate::lanes::LaneAssignment;
use crate::layout::{LaidOutEvent, layout_events};
use crate::spatial_hash::{RebuildStats, SpatialHash};
use crate::time_axis::{Tick, time_axis_ticks};
use crate::viewport::Viewport;

/// Everything the renderer needs for one revision. Built in one go and
/// never mutated afterwards.
#[derive(Debug)]
pub struct FrameLayout {
    pub revision: u64,
    pub lanes: Arc<LaneAssignment>,
    /// Visible events in draw order.
    pub laid_out: Vec<LaidOutEvent>,
    pub spatial_hash: SpatialHash,
    /// Empty while the view is fully expanded.
    pub clusters: Vec<Clustered>,
    pub expansion_factor: f64,
    pub labels: LabelVisibility,
    pub ticks: Vec<Tick>,
    pub rebuild: RebuildStats,
    cluster_marker_y: f64,
    cluster_radius: f64,
}

/// What sits under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameHit<'a> {
    Cluster(&'a EventCluster),
    Event(&'a Arc<Event>),
}

impl FrameLayout {
    pub fn build(
        revision: u64,
        events: &[Arc<Event>],
        lanes: Arc<LaneAssignment>,
        viewport: &Viewport,
        config: &LayoutConfig,
        measurer: &dyn TextMeasurer,
    ) -> Self {
        let laid_out = layout_events(events, &lanes, viewport, config);

        let mut spatial_hash = SpatialHash::new(config.bucket_width);
        let rebuild = spatial_hash.rebuild_from_layout(&laid_out);

        let spp = viewport.seconds_per_pixel();
        let expansion_factor =
            cluster_expansion_factor(spp, config.cluster_macro_spp, config.cluster_meso_spp);
        let clusters = if expansion_factor < 1.0 {
            let visible: Vec<Arc<Event>> =
                laid_out.iter().map(|item| Arc::clone(&item.event)).collect();
            cluster_events_with_threshold(
                &visible,
                &viewport.start,
                &viewport.scale,
                config.cluster_threshold_px,
            )
        } else {
            Vec::new()
        };

        let labels = detect_label_collisions(&laid_out, measurer, spp, config);
        let ticks = time_axis_ticks(viewport, config.tick_spacing_px);

        tracing::debug!(
            revision,
            visible = laid_out.len(),
            clusters = clusters.len(),
            labels = labels.len(),
            ticks = ticks.len(),
            rebuild_us = rebuild.duration.as_micros() as u64,
            "frame layout built"
        );

        Self {
            revision,
            lanes,
            laid_out,
            spatial_hash,
            clusters,
            expansion_factor,
            labels,
            ticks,
            rebuild,
            cluster_marker_y: config.axis_height + config.lane_height / 2.0,
            cluster_radius: config.cluster_radius,
        }
    }

    pub fn is_clustered(&self) -> bool {
        !self.clusters.is_empty()
    }

    /// Vertical center of cluster markers; they sit on the first lane row.
    pub fn cluster_marker_y(&self) -> f64 {
        self.cluster_marker_y
    }

    /// Cluster markers win over events; among events the last drawn wins.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<FrameHit<'_>> {
        let cluster = self.clusters.iter().find_map(|item| match item {
            Clustered::Cluster(cluster)
                if is_point_in_cluster(x, y, cluster, self.cluster_marker_y, self.cluster_radius) =>
            {
                Some(cluster)
            }
            _ => None,
        });
        if let Some(cluster) = cluster {
            return Some(FrameHit::Cluster(cluster));
        }
        self.spatial_hash.query_first(x, y).map(FrameHit::Event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::MonospaceMeasurer;
    use crate::lanes::assign_lanes;
    use crate::scale::RationalScale;

    fn build(events: &[Arc<Event>], spp: f64) -> FrameLayout {
        let config = LayoutConfig::default();
        let viewport = Viewport::new(0, RationalScale::from_seconds_per_pixel(spp), 800);
        let lanes = Arc::new(assign_lanes(events));
        FrameLayout::build(1, events, lanes, &viewport, &config, &MonospaceMeasurer::default())
    }

    #[test]
    fn expanded_frame_hits_events() {
        let events = vec![
            Arc::new(Event::span("a", 0, 1_000).with_label("first")),
            Arc::new(Event::span("b", 500, 1_500).with_label("second")),
        ];
        let frame = build(&events, 10.0);
        assert!(!frame.is_clustered());
        assert!((frame.expansion_factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(frame.laid_out.len(), 2);
        assert_eq!(frame.lanes.lane_count(), 2);

        let b = frame.spatial_hash.bounds("b").expect("b indexed");
        match frame.hit_test(b.x + 1.0, b.y + 1.0) {
            Some(FrameHit::Event(event)) => assert_eq!(event.id, "b"),
            other => unreachable!("expected b, got {other:?}"),
        }
        assert!(frame.hit_test(790.0, 2.0).is_none());
        assert_eq!(frame.labels.len(), 2);
        assert!(!frame.ticks.is_empty());
    }

    #[test]
    fn zoomed_out_frame_clusters_and_hits_marker() {
        const YEAR: i64 = 31_557_600;
        let events: Vec<Arc<Event>> = (0..50)
            .map(|i| Arc::new(Event::point(format!("p{i:02}"), i * YEAR)))
            .collect();
        let frame = build(&events, YEAR as f64 * 10.0);
        assert!(frame.is_clustered());
        assert!(frame.expansion_factor.abs() < f64::EPSILON);

        let cluster = frame
            .clusters
            .iter()
            .find_map(|item| match item {
                Clustered::Cluster(cluster) => Some(cluster),
                Clustered::Single(_) => None,
            })
            .expect("at least one cluster");
        match frame.hit_test(cluster.center_x, frame.cluster_marker_y()) {
            Some(FrameHit::Cluster(hit)) => assert_eq!(hit.count, cluster.count),
            other => unreachable!("expected cluster, got {other:?}"),
        }
    }

    #[test]
    fn empty_frame() {
        let frame = build(&[], 1.0);
        assert!(frame.laid_out.is_empty());
        assert!(frame.spatial_hash.is_empty());
        assert!(frame.labels.is_empty());
        assert!(frame.hit_test(10.0, 10.0).is_none());
    }
}
