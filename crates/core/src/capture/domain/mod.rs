pub mod capture_region;
pub mod frame_source;
