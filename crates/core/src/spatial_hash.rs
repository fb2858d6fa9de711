use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deeptime_protocol::{Event, EventId, Rect};

use crate::layout::LaidOutEvent;

pub const DEFAULT_BUCKET_WIDTH: f64 = 50.0;

/// Events spanning more buckets than this live in the wide list.
pub(crate) const MAX_BUCKET_SPAN: i64 = 1024;

/// Bucket containing screen x.
pub(crate) fn bucket_of(x: f64, bucket_width: f64) -> i64 {
    (x / bucket_width).floor() as i64
}

/// Buckets touched by the horizontal extent `[x, x + w]`.
pub(crate) fn bucket_span(x: f64, w: f64, bucket_width: f64) -> RangeInclusive<i64> {
    let first = bucket_of(x, bucket_width);
    let last = bucket_of(x + w.max(0.0), bucket_width);
    first..=last.max(first)
}

/// Timing of the last [`SpatialHash::rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildStats {
    pub duration: Duration,
    pub event_count: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    event: Arc<Event>,
    bounds: Rect,
}

/// Fixed-width x-buckets over one frame's event rectangles, rebuilt from
/// scratch every frame.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    bucket_width: f64,
    /// Entry indices per bucket, in insertion order.
    buckets: HashMap<i64, Vec<usize>>,
    /// Entries too wide to bucket, in insertion order.
    wide: Vec<usize>,
    entries: Vec<Entry>,
    bounds: HashMap<EventId, Rect>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_WIDTH)
    }
}

impl SpatialHash {
    /// `bucket_width` must be positive; non-positive values fall back to
    /// [`DEFAULT_BUCKET_WIDTH`].
    pub fn new(bucket_width: f64) -> Self {
        let bucket_width = if bucket_width.is_finite() && bucket_width > 0.0 {
            bucket_width
        } else {
            DEFAULT_BUCKET_WIDTH
        };
        Self {
            bucket_width,
            buckets: HashMap::new(),
            wide: Vec::new(),
            entries: Vec::new(),
            bounds: HashMap::new(),
        }
    }

    pub fn bucket_width(&self) -> f64 {
        self.bucket_width
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.wide.clear();
        self.entries.clear();
        self.bounds.clear();
    }

    /// Index `event` under the rectangle `(x, y, width, height)`. Later
    /// inserts draw on top of earlier ones.
    pub fn insert(&mut self, event: Arc<Event>, x: f64, y: f64, width: f64, height: f64) {
        let bounds = Rect::new(x, y, width, height);
        let index = self.entries.len();
        let span = bucket_span(x, width, self.bucket_width);

        if span.end().saturating_sub(*span.start()) >= MAX_BUCKET_SPAN {
            self.wide.push(index);
        } else {
            for bucket in span {
                self.buckets.entry(bucket).or_default().push(index);
            }
        }
        self.bounds.insert(event.id.clone(), bounds);
        self.entries.push(Entry { event, bounds });
    }

    /// Cached bounds of the most recent insert for `id`.
    pub fn bounds(&self, id: &str) -> Option<Rect> {
        self.bounds.get(id).copied()
    }

    /// Every event whose rectangle contains `(x, y)` (edges inclusive), in
    /// insertion order. Empty buckets yield an empty list.
    pub fn query(&self, x: f64, y: f64) -> Vec<&Arc<Event>> {
        self.hits(x, y)
            .into_iter()
            .map(|index| &self.entries[index].event)
            .collect()
    }

    /// Topmost event at `(x, y)`: the last one inserted, matching draw order.
    pub fn query_first(&self, x: f64, y: f64) -> Option<&Arc<Event>> {
        self.hits(x, y)
            .last()
            .map(|&index| &self.entries[index].event)
    }

    /// Discard everything and re-index `events`. `bounds_fn` returns `None`
    /// for events that should not be hit-testable this frame.
    pub fn rebuild<F>(&mut self, events: &[Arc<Event>], mut bounds_fn: F) -> RebuildStats
    where
        F: FnMut(&Event) -> Option<Rect>,
    {
        self.reindex(
            events
                .iter()
                .filter_map(|event| bounds_fn(event.as_ref()).map(|rect| (Arc::clone(event), rect))),
        )
    }

    /// Rebuild from an already laid-out frame, preserving its order.
    pub fn rebuild_from_layout(&mut self, laid_out: &[LaidOutEvent]) -> RebuildStats {
        self.reindex(
            laid_out
                .iter()
                .map(|item| (Arc::clone(&item.event), item.bounds)),
        )
    }

    fn reindex(&mut self, items: impl IntoIterator<Item = (Arc<Event>, Rect)>) -> RebuildStats {
        let started = Instant::now();
        self.clear();
        for (event, rect) in items {
            self.insert(event, rect.x, rect.y, rect.w, rect.h);
        }
        let stats = RebuildStats {
            duration: started.elapsed(),
            event_count: self.entries.len(),
        };
        tracing::debug!(
            events = stats.event_count,
            buckets = self.buckets.len(),
            wide = self.wide.len(),
            micros = stats.duration.as_micros() as u64,
            "spatial hash rebuilt"
        );
        stats
    }

    /// Entry indices containing the point, ascending.
    fn hits(&self, x: f64, y: f64) -> Vec<usize> {
        let bucket = self
            .buckets
            .get(&bucket_of(x, self.bucket_width))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut hits: Vec<usize> = bucket
            .iter()
            .chain(self.wide.iter())
            .copied()
            .filter(|&index| self.entries[index].bounds.contains(x, y))
            .collect();
        if !self.wide.is_empty() {
            hits.sort_unstable();
        }
        hits
    }
}
