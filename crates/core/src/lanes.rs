use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;

use deeptime_protocol::{Event, EventId};
use num_bigint::BigInt;

/// Lane index per event id plus the number of lanes in use.
///
/// Produced wholesale per layout revision and never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneAssignment {
    lanes: HashMap<EventId, usize>,
    lane_count: usize,
}

impl LaneAssignment {
    /// Wrap a mapping received from the layout worker. `lane_count` is
    /// raised if any lane index would fall outside it.
    pub fn from_parts(lanes: HashMap<EventId, usize>, lane_count: usize) -> Self {
        let needed = lanes.values().max().map_or(0, |max| max + 1);
        Self {
            lanes,
            lane_count: lane_count.max(needed),
        }
    }

    pub fn into_parts(self) -> (HashMap<EventId, usize>, usize) {
        (self.lanes, self.lane_count)
    }

    pub fn lane(&self, id: &str) -> Option<usize> {
        self.lanes.get(id).copied()
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EventId, usize)> {
        self.lanes.iter().map(|(id, lane)| (id, *lane))
    }
}

/// Assign every event to a display lane.
///
/// Order: `start` ascending, then duration descending with point events
/// ranked as infinitely long (they claim low lanes first), then `id`
/// ascending. The result depends only on the set of events, not on the
/// order of `events`. Ids are expected to be unique; a repeated id keeps the
/// lane of whichever copy sorts last.
pub fn assign_lanes<E: Borrow<Event>>(events: &[E]) -> LaneAssignment {
    if events.is_empty() {
        return LaneAssignment::default();
    }

    let mut sorted: Vec<(&Event, Option<BigInt>)> = events
        .iter()
        .map(|e| {
            let event = e.borrow();
            (event, event.duration())
        })
        .collect();
    sorted.sort_by(|(a, a_dur), (b, b_dur)| {
        a.start
            .cmp(&b.start)
            .then_with(|| compare_duration_desc(a_dur.as_ref(), b_dur.as_ref()))
            .then_with(|| a.id.cmp(&b.id))
    });

    // Exclusive end time of the last event placed in each lane.
    let mut lane_ends: Vec<BigInt> = Vec::new();
    let mut lanes = HashMap::with_capacity(sorted.len());

    for (event, _) in sorted {
        let free = lane_ends.iter().position(|end| *end <= event.start);
        let lane = match free {
            Some(lane) => {
                lane_ends[lane] = event.occupied_until();
                lane
            }
            None => {
                lane_ends.push(event.occupied_until());
                lane_ends.len() - 1
            }
        };
        lanes.insert(event.id.clone(), lane);
    }

    LaneAssignment {
        lanes,
        lane_count: lane_ends.len(),
    }
}

/// Longer first; `None` (point event) is longest of all.
fn compare_duration_desc(a: Option<&BigInt>, b: Option<&BigInt>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(a),
    }
}
