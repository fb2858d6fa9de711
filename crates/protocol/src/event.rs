use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::event_id::EventId;

/// A single timeline event, the atomic unit everything else lays out.
///
/// Times are whole seconds relative to an arbitrary origin and may be
/// negative. They are arbitrary precision because deep-time datasets reach
/// ~4.4×10^17 seconds, far past what an `f64` represents exactly.
///
/// - `end == None` is a *point event* (a zero-duration instant).
/// - `end >= start` is assumed to have been validated upstream. Nothing in
///   the engine panics when it is violated; layout may just look odd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    #[serde(with = "crate::decimal")]
    pub start: BigInt,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<BigInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Explicit label priority; higher renders first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

impl Event {
    /// A span event covering `[start, end)`.
    pub fn span(id: impl Into<EventId>, start: impl Into<BigInt>, end: impl Into<BigInt>) -> Self {
        Self {
            id: id.into(),
            start: start.into(),
            end: Some(end.into()),
            label: None,
            category: None,
            tags: Vec::new(),
            priority: None,
        }
    }

    /// A point event at `start`.
    pub fn point(id: impl Into<EventId>, start: impl Into<BigInt>) -> Self {
        Self {
            id: id.into(),
            start: start.into(),
            end: None,
            label: None,
            category: None,
            tags: Vec::new(),
            priority: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_point(&self) -> bool {
        self.end.is_none()
    }

    /// `end - start` for span events, `None` for point events.
    pub fn duration(&self) -> Option<BigInt> {
        self.end.as_ref().map(|end| end - &self.start)
    }

    /// Last instant covered on screen: `end` for spans, `start` for points.
    pub fn extent_end(&self) -> &BigInt {
        self.end.as_ref().unwrap_or(&self.start)
    }

    /// Exclusive end used when packing lanes. A point event blocks its lane
    /// for one second so two points at the same instant never share a lane.
    pub fn occupied_until(&self) -> BigInt {
        match &self.end {
            Some(end) => end.clone(),
            None => &self.start + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_and_span_helpers() {
        let p = Event::point("p", -5);
        assert!(p.is_point());
        assert_eq!(p.duration(), None);
        assert_eq!(p.extent_end(), &BigInt::from(-5));
        assert_eq!(p.occupied_until(), BigInt::from(-4));

        let s = Event::span("s", 10, 40);
        assert!(!s.is_point());
        assert_eq!(s.duration(), Some(BigInt::from(30)));
        assert_eq!(s.occupied_until(), BigInt::from(40));
    }

    #[test]
    fn times_serialize_as_decimal_strings() {
        let big = "-435485961600000000".parse::<BigInt>().expect("valid integer");
        let event = Event::span("bang", big.clone(), 0).with_label("Big Bang");
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""start":"-435485961600000000""#), "{json}");
        assert!(json.contains(r#""end":"0""#), "{json}");

        let back: Event = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.start, big);
        assert_eq!(back, event);
    }

    #[test]
    fn optional_fields_default() {
        let event: Event =
            serde_json::from_str(r#"{"id":"k-pg","start":"-2082672000000000"}"#).expect("parse");
        assert!(event.is_point());
        assert!(event.label.is_none());
        assert!(event.tags.is_empty());
    }

    #[test]
    fn numeric_times_are_rejected() {
        let err = serde_json::from_str::<Event>(r#"{"id":"x","start":12}"#);
        assert!(err.is_err());
    }
}
