pub mod camera_source;
pub mod monitor_source;
