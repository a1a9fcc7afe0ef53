//! The two event-debouncing state machines and the primitives they share.

pub mod button;
pub mod cancel;
pub mod engine;
pub mod gesture;
pub mod occupancy;
pub mod presence;
pub mod sequence;
pub mod window;

pub use cancel::{DelayedAction, TimerTicket};
pub use engine::{EngineHandle, OccupancyEngine};
pub use gesture::{Gesture, GestureClassifier};
pub use occupancy::OccupancyMachine;
pub use presence::{OccupancyGraph, OccupancyRequest, OccupancyState};
