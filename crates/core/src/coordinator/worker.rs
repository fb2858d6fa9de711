use std::collections::{HashSet, VecDeque};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use deeptime_protocol::{Event, WireViewport, WorkerMessage};

use super::transport::{LayoutTransport, TransportError};
use crate::lanes::assign_lanes;
use crate::viewport::Viewport;

/// Handle to a layout worker thread. Dropping it closes the request channel
/// and joins the thread.
#[derive(Debug)]
pub struct ThreadWorker {
    requests: Option<Sender<String>>,
    replies: Receiver<String>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    pub fn spawn() -> Result<Self, TransportError> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<String>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<String>();

        let handle = std::thread::Builder::new()
            .name("deeptime-layout".into())
            .spawn(move || run(&request_rx, &reply_tx))?;
        tracing::info!("layout worker started");

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            handle: Some(handle),
        })
    }
}

impl LayoutTransport for ThreadWorker {
    fn send(&self, message: &WorkerMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(message)?;
        self.requests
            .as_ref()
            .ok_or(TransportError::Disconnected)?
            .send(text)
            .map_err(|_| TransportError::Disconnected)
    }

    fn try_recv(&self) -> Result<Option<WorkerMessage>, TransportError> {
        match self.replies.try_recv() {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("layout worker panicked");
        }
        tracing::info!("layout worker stopped");
    }
}

/// Serve one layout request. Pure apart from timing.
pub fn serve_layout(request_id: u64, events: &[Event], viewport: &WireViewport) -> WorkerMessage {
    if Viewport::from_wire(viewport).is_none() {
        return WorkerMessage::LayoutError {
            request_id,
            message: "viewport scale must be a positive ratio".into(),
        };
    }
    let started = Instant::now();
    let (lanes, lane_count) = assign_lanes(events).into_parts();
    WorkerMessage::LayoutResult {
        request_id,
        lanes,
        lane_count,
        duration: started.elapsed().as_secs_f64() * 1_000.0,
    }
}

fn run(requests: &Receiver<String>, replies: &Sender<String>) {
    let mut cancelled: HashSet<u64> = HashSet::new();
    let mut backlog: VecDeque<WorkerMessage> = VecDeque::new();

    loop {
        let next = match backlog.pop_front() {
            Some(message) => message,
            None => match requests.recv() {
                Ok(text) => match decode(&text) {
                    Ok(message) => message,
                    Err(reply) => {
                        if !send(replies, &reply) {
                            return;
                        }
                        continue;
                    }
                },
                Err(_) => return,
            },
        };

        // Pick up cancels that arrived while the previous request ran.
        while let Ok(text) = requests.try_recv() {
            match decode(&text) {
                Ok(WorkerMessage::Cancel { request_id }) => {
                    cancelled.insert(request_id);
                }
                Ok(message) => backlog.push_back(message),
                Err(reply) => {
                    if !send(replies, &reply) {
                        return;
                    }
                }
            }
        }

        match next {
            WorkerMessage::Cancel { request_id } => {
                cancelled.insert(request_id);
            }
            WorkerMessage::Layout {
                request_id,
                events,
                viewport,
            } => {
                // Requests arrive in increasing id order.
                cancelled.retain(|&id| id >= request_id);
                if cancelled.remove(&request_id) {
                    tracing::debug!(request_id, "skipping cancelled layout request");
                    continue;
                }
                let reply = serve_layout(request_id, &events, &viewport);
                if !send(replies, &reply) {
                    return;
                }
            }
            other => {
                tracing::warn!(request_id = other.request_id(), "layout worker ignoring reply-type message");
            }
        }
    }
}

/// Decode a request, or build the error reply for it when the id is still
/// recoverable.
fn decode(text: &str) -> Result<WorkerMessage, WorkerMessage> {
    serde_json::from_str(text).map_err(|err| {
        let request_id = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.get("requestId").and_then(serde_json::Value::as_u64))
            .unwrap_or(0);
        WorkerMessage::LayoutError {
            request_id,
            message: format!("malformed request: {err}"),
        }
    })
}

fn send(replies: &Sender<String>, message: &WorkerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => replies.send(text).is_ok(),
        Err(err) => {
            tracing::warn!(%err, "encoding layout reply");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use num_bigint::BigInt;

    use super::*;
    use crate::scale::RationalScale;

    fn wire() -> WireViewport {
        Viewport::new(0, RationalScale::from_seconds_per_pixel(1.0), 800).to_wire()
    }

    fn wait_for(worker: &ThreadWorker) -> WorkerMessage {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match worker.try_recv() {
                Ok(Some(message)) => return message,
                Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(1)),
                other => unreachable!("no reply from worker: {other:?}"),
            }
        }
    }

    #[test]
    fn serve_layout_matches_direct_assignment() {
        let events = vec![
            Event::span("a", 0, 100),
            Event::span("b", 50, 150),
            Event::span("c", 200, 300),
        ];
        match serve_layout(1, &events, &wire()) {
            WorkerMessage::LayoutResult {
                request_id,
                lanes,
                lane_count,
                ..
            } => {
                assert_eq!(request_id, 1);
                assert_eq!(lane_count, 2);
                assert_eq!(lanes.get("b"), Some(&1));
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[test]
    fn serve_layout_rejects_bad_scale() {
        let mut viewport = wire();
        viewport.scale_numerator = BigInt::from(0);
        assert!(matches!(
            serve_layout(4, &[], &viewport),
            WorkerMessage::LayoutError { request_id: 4, .. }
        ));
    }

    #[test]
    fn thread_worker_round_trip() {
        let worker = ThreadWorker::spawn().expect("spawn worker");
        worker
            .send(&WorkerMessage::Layout {
                request_id: 11,
                events: vec![Event::span("x", 0, 10), Event::span("y", 5, 15)],
                viewport: wire(),
            })
            .expect("send");
        match wait_for(&worker) {
            WorkerMessage::LayoutResult {
                request_id,
                lane_count,
                ..
            } => {
                assert_eq!(request_id, 11);
                assert_eq!(lane_count, 2);
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_request_gets_error_reply() {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<String>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<String>();
        request_tx
            .send(r#"{"type":"layout","requestId":5,"events":[{"id":"a","start":1}]}"#.into())
            .expect("queue");
        drop(request_tx);
        run(&request_rx, &reply_tx);

        let reply: WorkerMessage =
            serde_json::from_str(&reply_rx.recv().expect("reply")).expect("decode");
        assert!(matches!(reply, WorkerMessage::LayoutError { request_id: 5, .. }));
    }

    #[test]
    fn queued_cancel_skips_request() {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<String>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<String>();
        let layout = |id| WorkerMessage::Layout {
            request_id: id,
            events: vec![Event::point("p", 0)],
            viewport: wire(),
        };
        for message in [layout(1), layout(2), WorkerMessage::Cancel { request_id: 2 }, layout(3)] {
            request_tx
                .send(serde_json::to_string(&message).expect("encode"))
                .expect("queue");
        }
        drop(request_tx);
        run(&request_rx, &reply_tx);
        drop(reply_tx);

        let ids: Vec<u64> = reply_rx
            .iter()
            .map(|text| serde_json::from_str::<WorkerMessage>(&text).expect("decode").request_id())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
