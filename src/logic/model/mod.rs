//! Model Module - scoring adapter and decision policy
//!
//! `inference` owns the artifact and produces raw outputs; `policy` turns
//! them into verdicts. Everything else is shared vocabulary.

pub mod error;
pub mod features;
pub mod inference;
pub mod labels;
pub mod output;
pub mod policy;
pub mod threshold;

// Re-export common types
pub use error::{DetectionError, DetectionResult};
pub use features::{FeatureVector, WindowFeatures};
pub use inference::{EngineOptions, InferenceEngine, ModelMetadata, OnnxEngine};
pub use labels::{LabelScheme, Verdict};
pub use output::{ModelSignature, OutputKind, RawModelOutput};
pub use policy::{Confidence, DecisionPolicy, PolicyKind, PredictionResult};
pub use threshold::ThresholdConfig;
