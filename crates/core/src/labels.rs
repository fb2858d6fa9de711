use std::collections::HashMap;

use deeptime_protocol::{EventId, Rect};
use num_traits::ToPrimitive;

use crate::config::{LabelWeights, LayoutConfig};
use crate::layout::LaidOutEvent;
use crate::spatial_hash::{MAX_BUCKET_SPAN, bucket_span};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}

/// Measures rendered text. Supplied by whatever owns fonts.
pub trait TextMeasurer {
    fn measure(&self, text: &str) -> TextMetrics;
}

impl<F> TextMeasurer for F
where
    F: Fn(&str) -> TextMetrics,
{
    fn measure(&self, text: &str) -> TextMetrics {
        self(text)
    }
}

/// Fixed advance per character; good enough for terminals and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 12.0,
        }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * self.char_width,
            height: self.line_height,
        }
    }
}

/// Labels selected for this frame and where each one goes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelVisibility {
    labels: HashMap<EventId, Rect>,
}

impl LabelVisibility {
    pub fn contains(&self, id: &str) -> bool {
        self.labels.contains_key(id)
    }

    /// Screen rectangle of an accepted label.
    pub fn rect(&self, id: &str) -> Option<Rect> {
        self.labels.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EventId> {
        self.labels.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EventId, &Rect)> {
        self.labels.iter()
    }
}

struct Candidate<'a> {
    id: &'a EventId,
    rect: Rect,
    score: f64,
}

/// Priority of an event's label: wider events, explicit priority, and longer
/// on-screen duration all push it up.
///
/// `zoom_level` is seconds per pixel; the duration term uses the unclipped
/// pixel length `ln(1 + duration / zoom_level)` so a span running far past
/// the canvas edge still outranks one that merely fills it.
pub fn label_score(item: &LaidOutEvent, zoom_level: f64, weights: &LabelWeights) -> f64 {
    let explicit = item.event.priority.filter(|p| p.is_finite()).unwrap_or(0.0);
    let duration_px = match (item.event.duration(), zoom_level) {
        (Some(duration), zoom) if zoom.is_finite() && zoom > 0.0 => {
            (duration.to_f64().unwrap_or(0.0) / zoom).max(0.0)
        }
        _ => 0.0,
    };
    weights.width * item.bounds.w + weights.priority * explicit + weights.duration * duration_px.ln_1p()
}

/// Pick the labels to draw this frame.
///
/// Events narrower than `config.label_min_width` or without label text are
/// never candidates. The returned labels are pairwise non-overlapping
/// (rectangles that only touch at an edge are fine).
pub fn detect_label_collisions(
    laid_out: &[LaidOutEvent],
    measurer: &dyn TextMeasurer,
    zoom_level: f64,
    config: &LayoutConfig,
) -> LabelVisibility {
    let bucket_width = if config.bucket_width > 0.0 {
        config.bucket_width
    } else {
        crate::spatial_hash::DEFAULT_BUCKET_WIDTH
    };

    let mut candidates: Vec<Candidate<'_>> = laid_out
        .iter()
        .filter(|item| item.bounds.w >= config.label_min_width)
        .filter_map(|item| {
            let text = item.event.label.as_deref().filter(|t| !t.is_empty())?;
            let metrics = measurer.measure(text);
            if !(metrics.width.is_finite() && metrics.height.is_finite()) {
                return None;
            }
            let b = item.bounds;
            Some(Candidate {
                id: &item.event.id,
                rect: Rect::new(
                    b.x + config.label_padding,
                    b.y + (b.h - metrics.height) / 2.0,
                    metrics.width.max(0.0),
                    metrics.height.max(0.0),
                ),
                score: label_score(item, zoom_level, &config.label_weights),
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(b.id)));

    let mut accepted: Vec<(&EventId, Rect)> = Vec::new();
    let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
    // Accepted labels too wide to bucket; every narrow candidate checks them.
    let mut wide: Vec<usize> = Vec::new();

    for candidate in candidates {
        let span = bucket_span(candidate.rect.x, candidate.rect.w, bucket_width);
        let is_wide = span.end().saturating_sub(*span.start()) >= MAX_BUCKET_SPAN;
        let collides = if is_wide {
            accepted.iter().any(|(_, rect)| rect.overlaps(&candidate.rect))
        } else {
            span.clone()
                .filter_map(|bucket| buckets.get(&bucket))
                .flatten()
                .chain(wide.iter())
                .any(|&i| accepted[i].1.overlaps(&candidate.rect))
        };
        if collides {
            continue;
        }
        let index = accepted.len();
        accepted.push((candidate.id, candidate.rect));
        if is_wide {
            wide.push(index);
        } else {
            for bucket in span {
                buckets.entry(bucket).or_default().push(index);
            }
        }
    }

    tracing::debug!(visible = accepted.len(), wide = wide.len(), "labels resolved");

    LabelVisibility {
        labels: accepted
            .into_iter()
            .map(|(id, rect)| (id.clone(), rect))
            .collect(),
    }
}
