pub mod onnx_detector;
pub mod skip_frame_detector;
