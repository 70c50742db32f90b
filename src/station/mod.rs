pub mod controller;
pub mod loop_worker;
pub mod state;

use std::path::PathBuf;

use crate::camera::Camera;
use crate::gate::Gate;
use crate::uplink::Reporter;

pub use controller::StationController;
pub use loop_worker::station_loop;
pub use state::{
    CyclePolicy, EventSink, StationEvent, StationEventKind, StationState, StationStats,
};

/// Everything one station loop owns for its whole lifetime.
pub struct Station<G, R> {
    pub gate: G,
    pub camera: Box<dyn Camera>,
    pub reporter: R,
    pub images_dir: PathBuf,
    pub policy: CyclePolicy,
    pub events: EventSink,
}

impl<G: Gate, R: Reporter> Station<G, R> {
    pub fn new(gate: G, camera: Box<dyn Camera>, reporter: R, images_dir: PathBuf) -> Self {
        Self {
            gate,
            camera,
            reporter,
            images_dir,
            policy: CyclePolicy::default(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_policy(mut self, policy: CyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }
}
