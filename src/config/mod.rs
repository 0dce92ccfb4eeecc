//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{load_config_file, load_default_config, save_config, save_default_config};
pub use paths::{config_dir, config_file_path, resolve_config_path};
pub use types::{
    AlarmConfig, AlgorithmConfig, Config, HeartbeatConfig, InferenceConfig, PlatformConfig,
    PublisherConfig, PublisherKind, ReconnectConfig, ReconnectStrategy, SceneConfig,
    SeverityLevels, SourceConfig, StreamConfig, StreamProtocol,
};
pub(crate) use validate::check_unit_range;
pub use validate::validate_config;
