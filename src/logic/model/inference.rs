//! Inference Engine - ONNX Runtime Integration
//!
//! Loads the scoring artifact once and exposes `score()`. No interpretation
//! happens here: the engine reads the artifact's signature at load time and
//! returns outputs tagged with that shape.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use ort::value::{Value, ValueType};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::{DetectionError, DetectionResult};
use super::features::FeatureVector;
use super::output::{ModelSignature, OutputKind, RawModelOutput};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Where the loaded model came from
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub source: String,
    /// SHA-256 of the artifact bytes, hex encoded
    pub checksum: Option<String>,
    pub runtime: String,
    pub loaded_at: DateTime<Utc>,
}

/// Load options for [`OnnxEngine`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Intra-op threads per session
    pub intra_threads: usize,
    /// Number of independent sessions
    pub pool_size: usize,
    /// Output to decode; first output when `None`
    pub output_name: Option<String>,
    /// Input width for artifacts with a dynamic feature dimension
    pub expected_features: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            intra_threads: 1,
            pool_size: 1,
            output_name: None,
            expected_features: None,
        }
    }
}

// ============================================================================
// INFERENCE ENGINE TRAIT
// ============================================================================

/// Model runtime adapter.
///
/// Implementations must be callable concurrently from many requests.
pub trait InferenceEngine: Send + Sync {
    fn signature(&self) -> &ModelSignature;

    fn metadata(&self) -> ModelMetadata;

    /// Run the model on one validated feature vector
    fn score(&self, features: &FeatureVector) -> DetectionResult<RawModelOutput>;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX Runtime engine backed by a pool of sessions.
///
/// `Session::run` needs exclusive access, so each call checks out one
/// session; requests only wait when every session is busy.
pub struct OnnxEngine {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    signature: ModelSignature,
    metadata: ModelMetadata,
}

impl OnnxEngine {
    /// Load the artifact and read its signature. Any failure is `ModelLoad`.
    pub fn load<P: AsRef<Path>>(path: P, options: &EngineOptions) -> DetectionResult<Self> {
        let path = path.as_ref();
        tracing::info!(
            path = %path.display(),
            pool_size = options.pool_size,
            threads = options.intra_threads,
            "Loading ONNX model"
        );

        if !path.exists() {
            return Err(DetectionError::ModelLoad(format!(
                "model not found: {}",
                path.display()
            )));
        }
        if options.pool_size == 0 {
            return Err(DetectionError::ModelLoad(
                "session pool size must be at least 1".to_string(),
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            DetectionError::ModelLoad(format!("failed to read {}: {}", path.display(), e))
        })?;

        let sessions = (0..options.pool_size)
            .map(|_| build_session(&bytes, options.intra_threads).map(Mutex::new))
            .collect::<DetectionResult<Vec<_>>>()?;

        let signature = read_signature(&sessions[0].lock(), options)?;

        let metadata = ModelMetadata {
            source: path.display().to_string(),
            checksum: Some(hex::encode(Sha256::digest(&bytes))),
            runtime: "ONNX Runtime (CPU)".to_string(),
            loaded_at: Utc::now(),
        };

        tracing::info!(
            input = %signature.input_name,
            input_width = signature.input_width,
            output = %signature.output_name,
            output_kind = ?signature.output_kind,
            checksum = metadata.checksum.as_deref().unwrap_or_default(),
            "ONNX model loaded successfully"
        );

        Ok(Self {
            sessions,
            next: AtomicUsize::new(0),
            signature,
            metadata,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }

    /// Free session if there is one, otherwise wait on the round-robin pick
    fn checkout(&self) -> MutexGuard<'_, Session> {
        let n = self.sessions.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        for offset in 0..n {
            if let Some(guard) = self.sessions[(start + offset) % n].try_lock() {
                return guard;
            }
        }
        self.sessions[start % n].lock()
    }
}

impl InferenceEngine for OnnxEngine {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }

    fn score(&self, features: &FeatureVector) -> DetectionResult<RawModelOutput> {
        let width = self.signature.input_width;
        if features.len() != width {
            return Err(DetectionError::invalid_input(
                width,
                format!("got {} features", features.len()),
            ));
        }

        let input_array =
            Array2::<f32>::from_shape_vec((1, width), features.as_slice().to_vec())
                .map_err(|e| DetectionError::Inference(format!("Array error: {}", e)))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| DetectionError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = self.checkout();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DetectionError::Inference(format!("Inference failed: {}", e)))?;

        let output_name = self.signature.output_name.as_str();
        let output = outputs.get(output_name).ok_or_else(|| {
            DetectionError::ContractViolation(format!(
                "output '{}' missing from results",
                output_name
            ))
        })?;

        match self.signature.output_kind {
            OutputKind::Logits { classes } => {
                let (_, data) = output
                    .try_extract_tensor::<f32>()
                    .map_err(|e| {
                        DetectionError::ContractViolation(format!("Extract error: {}", e))
                    })?;
                if data.len() < classes {
                    return Err(DetectionError::ContractViolation(format!(
                        "expected {} logits, model produced {}",
                        classes,
                        data.len()
                    )));
                }
                Ok(RawModelOutput::Logits(
                    data[..classes].iter().map(|&v| f64::from(v)).collect(),
                ))
            }
            OutputKind::Score => {
                let (_, data) = output
                    .try_extract_tensor::<f32>()
                    .map_err(|e| {
                        DetectionError::ContractViolation(format!("Extract error: {}", e))
                    })?;
                match data {
                    [score] => Ok(RawModelOutput::Score(f64::from(*score))),
                    _ => Err(DetectionError::ContractViolation(format!(
                        "expected one score, model produced {}",
                        data.len()
                    ))),
                }
            }
            OutputKind::ClassIndex => {
                let (_, data) = output
                    .try_extract_tensor::<i64>()
                    .map_err(|e| {
                        DetectionError::ContractViolation(format!("Extract error: {}", e))
                    })?;
                let label = data.first().copied().ok_or_else(|| {
                    DetectionError::ContractViolation("empty label tensor".to_string())
                })?;
                Ok(RawModelOutput::ClassIndex(label))
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn build_session(bytes: &[u8], intra_threads: usize) -> DetectionResult<Session> {
    Session::builder()
        .map_err(|e| DetectionError::ModelLoad(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| DetectionError::ModelLoad(format!("Failed to set optimization: {}", e)))?
        .with_intra_threads(intra_threads)
        .map_err(|e| DetectionError::ModelLoad(format!("Failed to set threads: {}", e)))?
        .commit_from_memory(bytes)
        .map_err(|e| DetectionError::ModelLoad(format!("Failed to load model: {}", e)))
}

fn read_signature(session: &Session, options: &EngineOptions) -> DetectionResult<ModelSignature> {
    let input = match session.inputs.as_slice() {
        [input] => input,
        inputs => {
            return Err(DetectionError::ModelLoad(format!(
                "model must declare exactly one input, found {}",
                inputs.len()
            )));
        }
    };

    let declared = match &input.input_type {
        ValueType::Tensor {
            ty: TensorElementType::Float32,
            shape,
            ..
        } => shape.last().copied().filter(|&d| d > 0).map(|d| d as usize),
        other => {
            return Err(DetectionError::ModelLoad(format!(
                "input '{}' must be a float32 tensor, found {:?}",
                input.name, other
            )));
        }
    };
    let input_width = resolve_input_width(declared, options.expected_features)?;

    let output = match &options.output_name {
        Some(name) => session.outputs.iter().find(|o| &o.name == name).ok_or_else(|| {
            DetectionError::ModelLoad(format!("model has no output named '{}'", name))
        })?,
        None => session
            .outputs
            .first()
            .ok_or_else(|| DetectionError::ModelLoad("model declares no outputs".to_string()))?,
    };

    let output_kind = match &output.output_type {
        ValueType::Tensor { ty, shape, .. } => classify_output(&output.name, *ty, shape)?,
        other => {
            return Err(DetectionError::ModelLoad(format!(
                "output '{}' is not a tensor ({:?})",
                output.name, other
            )));
        }
    };

    Ok(ModelSignature {
        input_name: input.name.clone(),
        input_width,
        output_name: output.name.clone(),
        output_kind,
    })
}

/// Declared width wins; the configured width fills in dynamic dimensions
fn resolve_input_width(
    declared: Option<usize>,
    configured: Option<usize>,
) -> DetectionResult<usize> {
    match (declared, configured) {
        (Some(d), Some(c)) if d != c => Err(DetectionError::ModelLoad(format!(
            "artifact expects {} features but {} were configured",
            d, c
        ))),
        (Some(d), _) => Ok(d),
        (None, Some(c)) => Ok(c),
        (None, None) => Err(DetectionError::ModelLoad(
            "artifact has a dynamic feature dimension; set EXPECTED_FEATURES".to_string(),
        )),
    }
}

/// Map an output tensor's element type and shape to an [`OutputKind`].
///
/// Float tensors of rank 0, `[1]` or a dynamic `[-1]` are per-sample scalars.
/// For rank >= 2 the last dimension is the class axis.
fn classify_output(name: &str, ty: TensorElementType, dims: &[i64]) -> DetectionResult<OutputKind> {
    match ty {
        TensorElementType::Int64 => Ok(OutputKind::ClassIndex),
        TensorElementType::Float32 => match dims {
            [] => Ok(OutputKind::Score),
            [n] if *n == 1 || *n <= 0 => Ok(OutputKind::Score),
            [n] => Err(DetectionError::ModelLoad(format!(
                "output '{}' is an unbatched vector of {} values",
                name, n
            ))),
            [.., last] => match *last {
                1 => Ok(OutputKind::Score),
                n if n >= 2 => Ok(OutputKind::Logits { classes: n as usize }),
                _ => Err(DetectionError::ModelLoad(format!(
                    "output '{}' has a dynamic class dimension",
                    name
                ))),
            },
        },
        other => Err(DetectionError::ModelLoad(format!(
            "output '{}' has unsupported element type {:?}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn expect_load_error(result: DetectionResult<OnnxEngine>) -> String {
        match result {
            Err(DetectionError::ModelLoad(msg)) => msg,
            Err(other) => panic!("expected ModelLoad, got {:?}", other),
            Ok(_) => panic!("expected ModelLoad, got a loaded engine"),
        }
    }

    #[test]
    fn test_missing_artifact_fails_load() {
        let msg = expect_load_error(OnnxEngine::load(
            "does/not/exist/bitb.onnx",
            &EngineOptions::default(),
        ));
        assert!(msg.contains("model not found"));
    }

    #[test]
    fn test_corrupt_artifact_fails_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an onnx graph").unwrap();
        expect_load_error(OnnxEngine::load(file.path(), &EngineOptions::default()));
    }

    #[test]
    fn test_zero_pool_fails_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = EngineOptions {
            pool_size: 0,
            ..Default::default()
        };
        let msg = expect_load_error(OnnxEngine::load(file.path(), &options));
        assert!(msg.contains("pool size"));
    }

    #[test]
    fn test_classify_logits() {
        assert_eq!(
            classify_output("logits", TensorElementType::Float32, &[-1, 3]).unwrap(),
            OutputKind::Logits { classes: 3 }
        );
        assert_eq!(
            classify_output("logits", TensorElementType::Float32, &[1, 2]).unwrap(),
            OutputKind::Logits { classes: 2 }
        );
    }

    #[test]
    fn test_classify_scalar_and_label() {
        assert_eq!(
            classify_output("prob", TensorElementType::Float32, &[-1, 1]).unwrap(),
            OutputKind::Score
        );
        assert_eq!(
            classify_output("prob", TensorElementType::Float32, &[-1]).unwrap(),
            OutputKind::Score
        );
        assert_eq!(
            classify_output("label", TensorElementType::Int64, &[-1]).unwrap(),
            OutputKind::ClassIndex
        );
    }

    #[test]
    fn test_classify_rejects_unknown_shapes() {
        assert!(classify_output("x", TensorElementType::Float32, &[1, -1]).is_err());
        assert!(classify_output("x", TensorElementType::String, &[1]).is_err());
    }

    #[test]
    fn test_classify_rejects_unbatched_logits() {
        for dims in [[3_i64], [2]] {
            match classify_output("logits", TensorElementType::Float32, &dims) {
                Err(DetectionError::ModelLoad(msg)) => assert!(msg.contains("unbatched")),
                other => panic!("{:?} should fail to load, got {:?}", dims, other),
            }
        }
        assert_eq!(
            classify_output("prob", TensorElementType::Float32, &[1]).unwrap(),
            OutputKind::Score
        );
        assert_eq!(
            classify_output("prob", TensorElementType::Float32, &[]).unwrap(),
            OutputKind::Score
        );
    }

    #[test]
    fn test_resolve_input_width() {
        assert_eq!(resolve_input_width(Some(3), None).unwrap(), 3);
        assert_eq!(resolve_input_width(Some(3), Some(3)).unwrap(), 3);
        assert_eq!(resolve_input_width(None, Some(4)).unwrap(), 4);
        assert!(resolve_input_width(Some(3), Some(2)).is_err());
        assert!(resolve_input_width(None, None).is_err());
    }
}
