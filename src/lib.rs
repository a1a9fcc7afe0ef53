pub mod calibration;
pub mod config;
pub mod error;
pub mod kernel;
pub mod lights;
pub mod sensors;

pub use config::Config;
pub use kernel::engine::OccupancyEngine;
pub use kernel::gesture::GestureClassifier;
