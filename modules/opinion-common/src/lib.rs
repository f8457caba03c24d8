pub mod config;
pub mod display;
pub mod error;
pub mod file_config;
pub mod keywords;
pub mod labels;
pub mod types;

pub use config::AppConfig;
pub use error::{OpinionError, Result};
pub use file_config::{
    load_config, load_or_default, CleanConfig, DateRangeConfig, FileConfig, LlmConfig,
    PathsConfig, TargetsConfig,
};
pub use keywords::KeywordLibrary;
pub use labels::*;
pub use types::*;
