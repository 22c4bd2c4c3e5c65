pub mod config;
pub mod error;
pub mod paths;

pub use config::Config;
pub use error::{FaceGateError, Result};
pub use paths::{config_search_path, system_config_file, user_config_file};
