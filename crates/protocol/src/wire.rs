use std::collections::HashMap;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::event_id::EventId;

/// Viewport as it travels to the layout worker.
///
/// The seconds-per-pixel ratio is sent as its exact numerator and
/// denominator so the worker sees the same scale the main thread does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireViewport {
    #[serde(with = "crate::decimal")]
    pub viewport_start: BigInt,
    #[serde(with = "crate::decimal")]
    pub scale_numerator: BigInt,
    #[serde(with = "crate::decimal")]
    pub scale_denominator: BigInt,
    pub canvas_width: u32,
}

/// Every message exchanged with a layout worker.
///
/// ```text
///   main ──layout──▶ worker        main ◀──layout-result── worker
///   main ──cancel──▶ worker        main ◀──layout-error─── worker
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    /// Compute a lane assignment for `events`.
    Layout {
        request_id: u64,
        events: Vec<Event>,
        viewport: WireViewport,
    },
    /// Lane assignment for `request_id`; `duration` is milliseconds spent
    /// computing it inside the worker.
    LayoutResult {
        request_id: u64,
        lanes: HashMap<EventId, usize>,
        lane_count: usize,
        duration: f64,
    },
    /// Advisory: the main thread no longer wants `request_id`.
    Cancel { request_id: u64 },
    /// The worker could not serve `request_id`.
    LayoutError { request_id: u64, message: String },
}

impl WorkerMessage {
    pub fn request_id(&self) -> u64 {
        match self {
            Self::Layout { request_id, .. }
            | Self::LayoutResult { request_id, .. }
            | Self::Cancel { request_id }
            | Self::LayoutError { request_id, .. } => *request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_request_shape() {
        let msg = WorkerMessage::Layout {
            request_id: 7,
            events: vec![Event::span("a", 0, 100)],
            viewport: WireViewport {
                viewport_start: BigInt::from(-50),
                scale_numerator: BigInt::from(31_557_600),
                scale_denominator: BigInt::from(1),
                canvas_width: 800,
            },
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "layout");
        assert_eq!(json["requestId"], 7);
        assert_eq!(json["viewport"]["viewportStart"], "-50");
        assert_eq!(json["viewport"]["canvasWidth"], 800);
        assert_eq!(json["events"][0]["start"], "0");
    }

    #[test]
    fn result_and_cancel_parse() {
        let result: WorkerMessage = serde_json::from_str(
            r#"{"type":"layout-result","requestId":3,"lanes":{"a":0,"b":1},"laneCount":2,"duration":0.5}"#,
        )
        .expect("parse result");
        match &result {
            WorkerMessage::LayoutResult {
                lanes, lane_count, ..
            } => {
                assert_eq!(*lane_count, 2);
                assert_eq!(lanes.get("b"), Some(&1));
            }
            other => unreachable!("unexpected message {other:?}"),
        }
        assert_eq!(result.request_id(), 3);

        let cancel: WorkerMessage =
            serde_json::from_str(r#"{"type":"cancel","requestId":9}"#).expect("parse cancel");
        assert_eq!(cancel, WorkerMessage::Cancel { request_id: 9 });
    }
}
