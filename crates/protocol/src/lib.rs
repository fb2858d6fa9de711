pub mod decimal;
pub mod event;
pub mod event_id;
pub mod types;
pub mod wire;

pub use decimal::DecimalError;
pub use event::Event;
pub use event_id::EventId;
pub use types::{Point, Rect};
pub use wire::{WireViewport, WorkerMessage};
