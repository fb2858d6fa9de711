//! Layout state for one timeline view.
//!
//! Every change to the event set or the viewport bumps a revision counter
//! and asks for a fresh lane assignment. Small event sets are assigned on
//! the spot. Large ones go to a background worker, tagged with the
//! revision, and the answer is picked up by [`LayoutCoordinator::poll`].
//! Only an answer for the newest revision is ever applied; anything older is
//! discarded. A worker that fails or stays silent past the timeout is
//! replaced by a synchronous assignment, provided its revision is still the
//! newest.

mod transport;
mod worker;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deeptime_protocol::{Event, WorkerMessage};

pub use transport::{LayoutTransport, TransportError};
pub use worker::{ThreadWorker, serve_layout};

use crate::config::LayoutConfig;
use crate::frame::FrameLayout;
use crate::labels::{MonospaceMeasurer, TextMeasurer};
use crate::lanes::{LaneAssignment, assign_lanes};
use crate::viewport::Viewport;

/// Where the newest revision stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    /// Nothing requested yet.
    Idle,
    /// Waiting on the worker.
    Computing,
    Applied,
    /// The worker failed; lanes were assigned synchronously instead.
    Failed,
}

/// What happened to a revision during [`LayoutCoordinator::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Applied { revision: u64, lane_count: usize },
    /// A newer revision exists; this one's result was dropped.
    Superseded { revision: u64 },
    FellBack {
        revision: u64,
        lane_count: usize,
        reason: String,
    },
}

pub struct LayoutCoordinator {
    config: LayoutConfig,
    viewport: Viewport,
    events: Vec<Arc<Event>>,
    transport: Option<Box<dyn LayoutTransport>>,
    measurer: Box<dyn TextMeasurer>,
    revision: u64,
    state: LayoutState,
    /// Outstanding worker requests by revision.
    in_flight: BTreeMap<u64, InFlight>,
    lanes: Arc<LaneAssignment>,
    applied_revision: u64,
    frame: Option<Arc<FrameLayout>>,
    /// Outcomes produced outside `poll`, reported on the next call.
    queued: Vec<PollOutcome>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    sent_at: Instant,
    cancelled: bool,
}

impl std::fmt::Debug for LayoutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCoordinator")
            .field("revision", &self.revision)
            .field("applied_revision", &self.applied_revision)
            .field("state", &self.state)
            .field("events", &self.events.len())
            .field("in_flight", &self.in_flight.len())
            .field("worker", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl LayoutCoordinator {
    /// A coordinator without a worker: every assignment is synchronous.
    pub fn new(config: LayoutConfig, viewport: Viewport) -> Self {
        Self {
            config,
            viewport,
            events: Vec::new(),
            transport: None,
            measurer: Box::new(MonospaceMeasurer::default()),
            revision: 0,
            state: LayoutState::Idle,
            in_flight: BTreeMap::new(),
            lanes: Arc::new(LaneAssignment::default()),
            applied_revision: 0,
            frame: None,
            queued: Vec::new(),
        }
    }

    /// Offload event sets of at least `worker_threshold` events to `transport`.
    pub fn with_transport(mut self, transport: Box<dyn LayoutTransport>) -> Self {
        tracing::info!(
            threshold = self.config.worker_threshold,
            "layout worker attached"
        );
        self.transport = Some(transport);
        self
    }

    pub fn with_measurer(mut self, measurer: impl TextMeasurer + 'static) -> Self {
        self.measurer = Box::new(measurer);
        self.frame = None;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision whose lane assignment is currently in use (0 before any).
    pub fn applied_revision(&self) -> u64 {
        self.applied_revision
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// The lane assignment in use. Replaced wholesale, never edited.
    pub fn lanes(&self) -> Arc<LaneAssignment> {
        Arc::clone(&self.lanes)
    }

    pub fn has_worker(&self) -> bool {
        self.transport.is_some()
    }

    /// Replace the event set. Returns the new revision.
    pub fn set_events(&mut self, events: impl IntoIterator<Item = Event>) -> u64 {
        self.events = events.into_iter().map(Arc::new).collect();
        self.request_layout()
    }

    /// Move or zoom the view. Returns the new revision.
    pub fn set_viewport(&mut self, viewport: Viewport) -> u64 {
        self.viewport = viewport;
        self.request_layout()
    }

    /// Pick up worker replies and handle timeouts. Never blocks.
    pub fn poll(&mut self) -> Vec<PollOutcome> {
        let mut outcomes = std::mem::take(&mut self.queued);

        let (messages, failure) = self.drain_transport();
        for message in messages {
            self.handle_message(message, &mut outcomes);
        }
        if let Some(err) = failure {
            self.handle_transport_failure(&err, &mut outcomes);
        }
        self.expire_requests(&mut outcomes);

        outcomes
    }

    /// Poll until the newest revision is no longer computing or `max_wait`
    /// has passed. For headless callers that have nothing else to do.
    pub fn settle(&mut self, max_wait: Duration) -> Vec<PollOutcome> {
        let deadline = Instant::now() + max_wait;
        let mut outcomes = self.poll();
        while self.state == LayoutState::Computing && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
            outcomes.extend(self.poll());
        }
        outcomes
    }

    /// Frame for the newest revision, laid out with the lanes in use.
    ///
    /// Cached until the revision or the applied lanes change; the cached
    /// frame is swapped out whole, so holders of an older `Arc` keep a
    /// consistent snapshot.
    pub fn frame(&mut self) -> Arc<FrameLayout> {
        if let Some(frame) = &self.frame {
            return Arc::clone(frame);
        }
        let frame = Arc::new(FrameLayout::build(
            self.revision,
            &self.events,
            Arc::clone(&self.lanes),
            &self.viewport,
            &self.config,
            self.measurer.as_ref(),
        ));
        self.frame = Some(Arc::clone(&frame));
        frame
    }

    fn request_layout(&mut self) -> u64 {
        self.revision += 1;
        self.frame = None;
        let revision = self.revision;

        // Older requests stay in flight; their results will be dropped.
        // Each one is cancelled at most once.
        let stale: Vec<u64> = self
            .in_flight
            .iter_mut()
            .filter(|(_, request)| !request.cancelled)
            .map(|(&request_id, request)| {
                request.cancelled = true;
                request_id
            })
            .collect();
        for request_id in stale {
            self.send_cancel(request_id);
        }

        let sent = match &self.transport {
            Some(transport) if self.events.len() >= self.config.worker_threshold => {
                let message = WorkerMessage::Layout {
                    request_id: revision,
                    events: self.events.iter().map(|event| (**event).clone()).collect(),
                    viewport: self.viewport.to_wire(),
                };
                Some(transport.send(&message))
            }
            _ => None,
        };

        match sent {
            Some(Ok(())) => {
                tracing::debug!(revision, events = self.events.len(), "layout sent to worker");
                self.in_flight.insert(
                    revision,
                    InFlight {
                        sent_at: Instant::now(),
                        cancelled: false,
                    },
                );
                self.state = LayoutState::Computing;
            }
            Some(Err(err)) => {
                self.detach_if_disconnected(&err);
                let mut outcomes = std::mem::take(&mut self.queued);
                self.fall_back(revision, &err, &mut outcomes);
                self.queued = outcomes;
            }
            None => {
                let lanes = assign_lanes(&self.events);
                let lane_count = lanes.lane_count();
                if self.apply(revision, lanes) {
                    self.state = LayoutState::Applied;
                    self.queued.push(PollOutcome::Applied {
                        revision,
                        lane_count,
                    });
                }
            }
        }
        revision
    }

    fn drain_transport(&self) -> (Vec<WorkerMessage>, Option<TransportError>) {
        let Some(transport) = &self.transport else {
            return (Vec::new(), None);
        };
        let mut messages = Vec::new();
        loop {
            match transport.try_recv() {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => return (messages, None),
                Err(err) => return (messages, Some(err)),
            }
        }
    }

    fn handle_message(&mut self, message: WorkerMessage, outcomes: &mut Vec<PollOutcome>) {
        match message {
            WorkerMessage::LayoutResult {
                request_id,
                lanes,
                lane_count,
                duration,
            } => {
                if self.in_flight.remove(&request_id).is_none() {
                    tracing::debug!(request_id, "dropping unsolicited layout result");
                    return;
                }
                if request_id != self.revision {
                    tracing::debug!(
                        request_id,
                        revision = self.revision,
                        "dropping superseded layout result"
                    );
                    outcomes.push(PollOutcome::Superseded {
                        revision: request_id,
                    });
                    return;
                }
                let assignment = LaneAssignment::from_parts(lanes, lane_count);
                let lane_count = assignment.lane_count();
                if self.apply(request_id, assignment) {
                    tracing::debug!(
                        revision = request_id,
                        lane_count,
                        worker_ms = duration,
                        "worker layout applied"
                    );
                    self.state = LayoutState::Applied;
                    outcomes.push(PollOutcome::Applied {
                        revision: request_id,
                        lane_count,
                    });
                }
            }
            WorkerMessage::LayoutError {
                request_id,
                message,
            } => {
                if self.in_flight.remove(&request_id).is_none() {
                    tracing::debug!(request_id, %message, "dropping unsolicited layout error");
                    return;
                }
                let err = TransportError::Worker {
                    request_id,
                    message,
                };
                self.fall_back(request_id, &err, outcomes);
            }
            other => {
                tracing::warn!(
                    request_id = other.request_id(),
                    "unexpected message from layout worker"
                );
            }
        }
    }

    /// Everything in flight is lost. A disconnected worker is detached so
    /// later revisions go straight to the synchronous path.
    fn handle_transport_failure(&mut self, err: &TransportError, outcomes: &mut Vec<PollOutcome>) {
        self.detach_if_disconnected(err);
        let lost: Vec<u64> = std::mem::take(&mut self.in_flight).into_keys().collect();
        for request_id in lost {
            self.fall_back(request_id, err, outcomes);
        }
    }

    fn detach_if_disconnected(&mut self, err: &TransportError) {
        if matches!(err, TransportError::Disconnected) && self.transport.take().is_some() {
            tracing::warn!("layout worker disconnected; assigning lanes synchronously from now on");
        }
    }

    fn expire_requests(&mut self, outcomes: &mut Vec<PollOutcome>) {
        let timeout = self.config.worker_timeout();
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, request)| request.sent_at.elapsed() >= timeout)
            .map(|(&request_id, _)| request_id)
            .collect();
        for request_id in expired {
            if self.in_flight.remove(&request_id).is_some_and(|request| !request.cancelled) {
                self.send_cancel(request_id);
            }
            let err = TransportError::Timeout {
                request_id,
                after: timeout,
            };
            self.fall_back(request_id, &err, outcomes);
        }
    }

    /// Assign lanes synchronously for `revision` if it is still the newest.
    fn fall_back(&mut self, revision: u64, err: &TransportError, outcomes: &mut Vec<PollOutcome>) {
        self.in_flight.remove(&revision);
        if revision != self.revision {
            outcomes.push(PollOutcome::Superseded { revision });
            return;
        }
        tracing::warn!(revision, error = %err, "layout worker failed; assigning lanes synchronously");
        let lanes = assign_lanes(&self.events);
        let lane_count = lanes.lane_count();
        if self.apply(revision, lanes) {
            self.state = LayoutState::Failed;
            outcomes.push(PollOutcome::FellBack {
                revision,
                lane_count,
                reason: err.to_string(),
            });
        }
    }

    /// Swap in `lanes` unless a revision at least as new is already applied.
    fn apply(&mut self, revision: u64, lanes: LaneAssignment) -> bool {
        if revision <= self.applied_revision {
            tracing::debug!(
                revision,
                applied = self.applied_revision,
                "not applying out-of-order lanes"
            );
            return false;
        }
        self.lanes = Arc::new(lanes);
        self.applied_revision = revision;
        self.frame = None;
        true
    }

    fn send_cancel(&self, request_id: u64) {
        let Some(transport) = &self.transport else {
            return;
        };
        if let Err(err) = transport.send(&WorkerMessage::Cancel { request_id }) {
            tracing::debug!(request_id, error = %err, "cancel not delivered");
        }
    }
}
