pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod frame;
pub mod labels;
pub mod lanes;
pub mod layout;
pub mod scale;
pub mod spatial_hash;
pub mod time_axis;
pub mod viewport;

pub use cluster::{Clustered, EventCluster, cluster_events, cluster_expansion_factor};
pub use config::{ConfigError, LabelWeights, LayoutConfig};
pub use coordinator::{
    LayoutCoordinator, LayoutState, LayoutTransport, PollOutcome, ThreadWorker, TransportError,
};
pub use frame::{FrameHit, FrameLayout};
pub use labels::{LabelVisibility, MonospaceMeasurer, TextMeasurer, TextMetrics};
pub use lanes::{LaneAssignment, assign_lanes};
pub use layout::LaidOutEvent;
pub use scale::RationalScale;
pub use spatial_hash::SpatialHash;
pub use time_axis::Tick;
pub use viewport::Viewport;
