//! Detector - validation, scoring and decision in one call
//!
//! Holds the loaded engine and the configured policy. Both are read-only
//! after start-up; the only shared mutable state is a pair of counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::model::{
    DecisionPolicy, DetectionError, DetectionResult, FeatureVector, InferenceEngine, LabelScheme,
    ModelMetadata, OutputKind, PolicyKind, PredictionResult, ThresholdConfig,
};

/// Engine status for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub model: ModelMetadata,
    pub input_width: usize,
    pub output: OutputKind,
    pub class_count: usize,
    pub policy: PolicyKind,
    pub label_scheme: LabelScheme,
    pub thresholds: ThresholdConfig,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
}

pub struct Detector {
    engine: Arc<dyn InferenceEngine>,
    policy: DecisionPolicy,
    log_predictions: bool,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl Detector {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        policy: DecisionPolicy,
        log_predictions: bool,
    ) -> Self {
        Self {
            engine,
            policy,
            log_predictions,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    /// Input width the loaded model expects
    pub fn expected_features(&self) -> usize {
        self.engine.signature().input_width
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Validate, score and decide.
    ///
    /// Feature values and raw outputs only reach the logs at debug level and
    /// only when prediction logging is enabled.
    pub fn detect(&self, values: &[f64]) -> DetectionResult<PredictionResult> {
        let features = FeatureVector::new(values, self.expected_features())?;
        let start = Instant::now();

        let raw = self.engine.score(&features).inspect_err(|e| {
            if matches!(e, DetectionError::Inference(_) | DetectionError::ContractViolation(_)) {
                tracing::error!(input_len = features.len(), error = %e, "Inference failed");
            }
        })?;

        if self.log_predictions {
            tracing::debug!(features = ?features.as_slice(), raw = ?raw, "Model output");
        }

        let result = self.policy.decide(&raw).inspect_err(|e| {
            tracing::error!(
                output = raw.kind_name(),
                policy = %self.policy.kind(),
                labels = %self.policy.labels(),
                error = %e,
                "Model output does not match the decision policy"
            );
        })?;

        let elapsed = start.elapsed().as_micros() as u64;
        self.latency_sum_us.fetch_add(elapsed, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        if self.log_predictions {
            tracing::debug!(
                predicted_class = result.predicted_class,
                confidence = ?result.confidence,
                probabilities = ?result.probabilities,
                latency_us = elapsed,
                "Prediction"
            );
        }

        Ok(result)
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            model: self.engine.metadata(),
            input_width: self.expected_features(),
            output: self.policy.output_kind(),
            class_count: self.policy.labels().class_count(),
            policy: self.policy.kind(),
            label_scheme: self.policy.labels(),
            thresholds: *self.policy.thresholds(),
            inference_count: count,
            avg_latency_ms: avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{ModelSignature, RawModelOutput};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Engine that returns a canned output and counts calls
    struct CannedEngine {
        signature: ModelSignature,
        output: RawModelOutput,
        calls: AtomicUsize,
    }

    impl CannedEngine {
        fn new(output_kind: OutputKind, output: RawModelOutput) -> Self {
            Self {
                signature: ModelSignature {
                    input_name: "input".to_string(),
                    input_width: 3,
                    output_name: "output".to_string(),
                    output_kind,
                },
                output,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl InferenceEngine for CannedEngine {
        fn signature(&self) -> &ModelSignature {
            &self.signature
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                source: "<canned>".to_string(),
                checksum: None,
                runtime: "test".to_string(),
                loaded_at: Utc::now(),
            }
        }

        fn score(&self, _features: &FeatureVector) -> DetectionResult<RawModelOutput> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.output.clone())
        }
    }

    fn detector(engine: Arc<CannedEngine>, kind: PolicyKind) -> Detector {
        let policy = DecisionPolicy::for_signature(
            kind,
            ThresholdConfig::default(),
            None,
            engine.signature(),
        )
        .unwrap();
        Detector::new(engine, policy, true)
    }

    #[test]
    fn test_detect_end_to_end() {
        let engine = Arc::new(CannedEngine::new(
            OutputKind::Logits { classes: 3 },
            RawModelOutput::Logits(vec![0.1, 1.2, 3.0]),
        ));
        let detector = detector(engine.clone(), PolicyKind::ThresholdArgmax);

        let result = detector.detect(&[420.0, 380.0, 1.0]).unwrap();
        assert_eq!(result.predicted_class, 2);
        assert_eq!(result.message(), "BitB Attack Detected");
        assert_eq!(engine.calls.load(Ordering::Relaxed), 1);

        let status = detector.status();
        assert_eq!(status.inference_count, 1);
        assert_eq!(status.class_count, 3);
        assert_eq!(status.label_scheme, LabelScheme::Bitb);
    }

    #[test]
    fn test_invalid_input_never_reaches_engine() {
        let engine = Arc::new(CannedEngine::new(
            OutputKind::Logits { classes: 3 },
            RawModelOutput::Logits(vec![0.0, 0.0, 0.0]),
        ));
        let detector = detector(engine.clone(), PolicyKind::Argmax);

        for bad in [&[1.0, 2.0][..], &[][..], &[1.0, f64::NAN, 2.0][..]] {
            let err = detector.detect(bad).unwrap_err();
            assert!(matches!(err, DetectionError::InvalidInput { expected: 3, .. }));
        }
        assert_eq!(engine.calls.load(Ordering::Relaxed), 0);
        assert_eq!(detector.status().inference_count, 0);
    }

    #[test]
    fn test_contract_violation_surfaces() {
        let engine = Arc::new(CannedEngine::new(
            OutputKind::ClassIndex,
            RawModelOutput::ClassIndex(7),
        ));
        let detector = detector(engine, PolicyKind::Argmax);
        let err = detector.detect(&[1.0, 2.0, 0.0]).unwrap_err();
        assert!(matches!(err, DetectionError::ContractViolation(_)));
    }
}
