//! Core library for real-time player detection.
//!
//! Organized into bounded contexts, each split into `domain` (traits
//! and pure logic) and `infrastructure` (adapters over external
//! systems):
//!
//! - [`capture`]: frame acquisition from monitors and cameras
//! - [`detection`]: ONNX inference and player assembly
//! - [`pipeline`]: the capture, detect, assemble, present loop
//! - [`shared`]: frame and geometry primitives used everywhere

pub mod capture;
pub mod detection;
pub mod pipeline;
pub mod shared;
