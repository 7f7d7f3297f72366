mod host_controller;
mod synchronizer;

pub use host_controller::*;
pub use synchronizer::*;
