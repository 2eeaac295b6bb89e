// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod project_file;
pub mod toml_config;

// Re-export adapters
pub use exec_ffmpeg::FfmpegEncoder;
pub use toml_config::TomlConfigAdapter;
