//! Logic Module - detection core
//!
//! - `model/` - scoring adapter (ONNX), decision policy, labels
//! - `detector` - request-level orchestration and stats

pub mod detector;
pub mod model;

pub use detector::{Detector, EngineStatus};
