use serde::{Deserialize, Serialize};

/// Occupancy of the monitored room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OccupancyState {
    /// Nobody inside, light left as it was turned off.
    #[default]
    Empty,
    /// Someone entered and has not left.
    Occupied,
    /// An exit was seen; the light goes off when the exit delay runs out.
    Exiting,
}

/// Observations that request an occupancy transition.
/// These are REQUESTS; the graph decides whether they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyRequest {
    EntranceDetected,
    ExitDetected,
    /// The room-side sensor sees someone while the exit delay runs.
    InnerRetriggered,
    ExitDelayElapsed,
}

pub struct OccupancyGraph;

impl OccupancyGraph {
    /// Pure function: (Current State, Request) -> New State.
    /// Returns None if the transition is ignored in the current state.
    pub fn transition(current: OccupancyState, request: OccupancyRequest) -> Option<OccupancyState> {
        use OccupancyRequest::*;
        use OccupancyState::*;

        match (current, request) {
            (Empty, EntranceDetected) => Some(Occupied),
            (Occupied, ExitDetected) => Some(Exiting),
            (Exiting, InnerRetriggered) => Some(Occupied),
            (Exiting, ExitDelayElapsed) => Some(Empty),
            // Exit while empty, entrance while occupied, stale timers.
            _ => None,
        }
    }
}
