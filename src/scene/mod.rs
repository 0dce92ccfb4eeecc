//! Scene lifecycle: deployments, teardown and expiry.

mod expiry;
mod manager;
mod types;

pub use expiry::spawn_expiry_sweep;
pub use manager::{Collaborators, ManagerSettings, SceneManager};
pub use types::{
    DeployReport, DeployRequest, DeviceFailure, DeviceRequest, SceneSnapshot, StopReport,
    TimeWindow, load_scenes_file,
};
