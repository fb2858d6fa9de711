use deeptime_protocol::{Event, WireViewport};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::scale::{RationalScale, clamp_seconds_per_pixel};

/// The visible time window `[start, end())` at the current zoom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub start: BigInt,
    pub scale: RationalScale,
    /// Canvas width in CSS pixels.
    pub canvas_width: u32,
}

impl Viewport {
    pub fn new(start: impl Into<BigInt>, scale: RationalScale, canvas_width: u32) -> Self {
        Self {
            start: start.into(),
            scale,
            canvas_width,
        }
    }

    /// A window just wide enough to show every event, or `None` if there
    /// are none or the canvas has no width.
    pub fn fit<'a>(events: impl IntoIterator<Item = &'a Event>, canvas_width: u32) -> Option<Self> {
        if canvas_width == 0 {
            return None;
        }
        let mut events = events.into_iter();
        let first = events.next()?;
        let (mut min, mut max) = (&first.start, first.extent_end().max(&first.start));
        for event in events {
            min = min.min(&event.start);
            max = max.max(event.extent_end()).max(&event.start);
        }
        // One extra second so the last instant lands inside the half-open window.
        let span = (max - min + 1u32).to_f64().unwrap_or(f64::MAX);
        let spp = clamp_seconds_per_pixel(span / f64::from(canvas_width));
        Some(Self::new(
            min.clone(),
            RationalScale::from_seconds_per_pixel(spp),
            canvas_width,
        ))
    }

    /// Exclusive end of the visible window.
    pub fn end(&self) -> BigInt {
        &self.start + self.scale.px_to_time(f64::from(self.canvas_width))
    }

    pub fn seconds_per_pixel(&self) -> f64 {
        self.scale.seconds_per_pixel()
    }

    /// Screen x of an absolute time.
    pub fn time_to_x(&self, time: &BigInt) -> f64 {
        self.scale.time_to_px(&(time - &self.start))
    }

    /// Absolute time under screen x.
    pub fn x_to_time(&self, x: f64) -> BigInt {
        &self.start + self.scale.px_to_time(x)
    }

    /// Whether `[start, end)` intersects the visible window. An empty range
    /// (`end <= start`) counts as the instant `start`.
    pub fn contains_range(&self, start: &BigInt, end: &BigInt) -> bool {
        let view_end = self.end();
        if end <= start {
            return start >= &self.start && start < &view_end;
        }
        start < &view_end && end > &self.start
    }

    /// Shift the window right by `dx` pixels (left when negative).
    pub fn pan_by_pixels(&mut self, dx: f64) {
        self.start += self.scale.px_to_time(dx);
    }

    /// Multiply seconds-per-pixel by `factor` (>1 zooms out), keeping the
    /// time under `anchor_x` in place.
    pub fn zoom_around(&mut self, anchor_x: f64, factor: f64) {
        let anchor_time = self.x_to_time(anchor_x);
        self.scale = self.scale.zoomed(factor);
        self.start = anchor_time - self.scale.px_to_time(anchor_x);
    }

    pub fn to_wire(&self) -> WireViewport {
        WireViewport {
            viewport_start: self.start.clone(),
            scale_numerator: self.scale.numerator().clone(),
            scale_denominator: self.scale.denominator().clone(),
            canvas_width: self.canvas_width,
        }
    }

    /// Rebuild from the wire form; `None` if the scale ratio is not positive.
    pub fn from_wire(wire: &WireViewport) -> Option<Self> {
        let scale = RationalScale::from_ratio(
            wire.scale_numerator.clone(),
            wire.scale_denominator.clone(),
        )?;
        Some(Self::new(wire.viewport_start.clone(), scale, wire.canvas_width))
    }
}
