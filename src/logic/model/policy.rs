//! Decision Policy
//!
//! Turns a [`RawModelOutput`] into a [`PredictionResult`]. Pure and
//! stateless; one named policy is selected per deployment.
//!
//! - Logits are normalized with a max-shifted softmax, then resolved by
//!   [`PolicyKind::Argmax`] or [`PolicyKind::ThresholdArgmax`].
//! - Scalar scores are compared against `ThresholdConfig::score_threshold`.
//! - Class indices are taken as-is and carry no confidence.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{DetectionError, DetectionResult};
use super::labels::{LabelScheme, Verdict};
use super::output::{ModelSignature, OutputKind, RawModelOutput};
use super::threshold::ThresholdConfig;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Class-selection policy for logit models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Most probable class, lowest index on ties
    Argmax,
    /// Most severe class that is both the most probable and above the floor
    ThresholdArgmax,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Argmax => write!(f, "argmax"),
            PolicyKind::ThresholdArgmax => write!(f, "threshold-argmax"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argmax" => Ok(PolicyKind::Argmax),
            "threshold-argmax" | "threshold_argmax" => Ok(PolicyKind::ThresholdArgmax),
            other => Err(format!(
                "unknown decision policy '{}' (expected argmax or threshold-argmax)",
                other
            )),
        }
    }
}

/// How much the model backs its verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    /// Softmax probability of the selected class
    Probability(f64),
    /// Raw scalar score as emitted by the model
    RawScore(f64),
    /// Model emitted a label only
    NotApplicable,
}

impl Confidence {
    pub fn value(&self) -> Option<f64> {
        match self {
            Confidence::Probability(v) | Confidence::RawScore(v) => Some(*v),
            Confidence::NotApplicable => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Confidence::Probability(_) => "probability",
            Confidence::RawScore(_) => "raw_score",
            Confidence::NotApplicable => "not_applicable",
        }
    }
}

/// Outcome of a single decision
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_class: usize,
    pub verdict: Verdict,
    pub confidence: Confidence,
    /// Only present for logit models
    pub probabilities: Option<Vec<f64>>,
}

impl PredictionResult {
    pub fn message(&self) -> &'static str {
        self.verdict.message()
    }
}

// ============================================================================
// NUMERICS
// ============================================================================

/// Numerically stable softmax.
///
/// The maximum is subtracted before exponentiating, so the largest term is
/// always `exp(0) = 1` and the sum never overflows. Inputs must be finite.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the maximum; the lowest index wins ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Walk classes from most to least severe; class 0 is the default
pub fn threshold_argmax(probabilities: &[f64], floor: f64) -> usize {
    let max = probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (1..probabilities.len())
        .rev()
        .find(|&class| probabilities[class] >= floor && probabilities[class] == max)
        .unwrap_or(0)
}

// ============================================================================
// POLICY
// ============================================================================

/// Decision policy bound to one artifact's output contract
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    kind: PolicyKind,
    thresholds: ThresholdConfig,
    labels: LabelScheme,
    output_kind: OutputKind,
}

impl DecisionPolicy {
    /// Bind a policy to the artifact's signature.
    ///
    /// The label scheme is derived from the output shape. An explicit scheme
    /// must agree with it; a conflict is reported as `ModelLoad`.
    pub fn for_signature(
        kind: PolicyKind,
        thresholds: ThresholdConfig,
        labels: Option<LabelScheme>,
        signature: &ModelSignature,
    ) -> DetectionResult<Self> {
        thresholds.validate().map_err(DetectionError::ModelLoad)?;

        let labels = match signature.output_kind {
            OutputKind::Logits { classes } => {
                let derived = LabelScheme::for_class_count(classes).ok_or_else(|| {
                    DetectionError::ModelLoad(format!(
                        "output '{}' has {} classes; no label scheme covers that width",
                        signature.output_name, classes
                    ))
                })?;
                match labels {
                    Some(explicit) if explicit != derived => {
                        return Err(DetectionError::ModelLoad(format!(
                            "label scheme '{}' does not fit a {}-class output",
                            explicit, classes
                        )));
                    }
                    _ => derived,
                }
            }
            OutputKind::Score => match labels {
                Some(LabelScheme::Bitb) => {
                    return Err(DetectionError::ModelLoad(
                        "scalar-score output only supports the binary label scheme".to_string(),
                    ));
                }
                _ => LabelScheme::Binary,
            },
            OutputKind::ClassIndex => labels.unwrap_or(LabelScheme::Bitb),
        };

        Ok(Self {
            kind,
            thresholds,
            labels,
            output_kind: signature.output_kind,
        })
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn labels(&self) -> LabelScheme {
        self.labels
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    /// Resolve raw model output into a verdict
    pub fn decide(&self, raw: &RawModelOutput) -> DetectionResult<PredictionResult> {
        if !self.output_kind.matches(raw) {
            return Err(DetectionError::ContractViolation(format!(
                "expected {:?} output, model produced {} with {}",
                self.output_kind,
                raw.kind_name(),
                describe(raw)
            )));
        }

        let (class, confidence, probabilities) = match raw {
            RawModelOutput::Logits(logits) => {
                if logits.len() < 2 {
                    return Err(DetectionError::ContractViolation(format!(
                        "logit output needs at least 2 classes, got {}",
                        logits.len()
                    )));
                }
                if logits.iter().any(|v| !v.is_finite()) {
                    return Err(DetectionError::ContractViolation(
                        "model produced non-finite logits".to_string(),
                    ));
                }

                let probs = softmax(logits);
                let class = match self.kind {
                    PolicyKind::Argmax => argmax(&probs),
                    PolicyKind::ThresholdArgmax => {
                        threshold_argmax(&probs, self.thresholds.class_floor)
                    }
                };
                (class, Confidence::Probability(probs[class]), Some(probs))
            }
            RawModelOutput::Score(score) => {
                if !score.is_finite() {
                    return Err(DetectionError::ContractViolation(
                        "model produced a non-finite score".to_string(),
                    ));
                }
                let class = usize::from(*score >= self.thresholds.score_threshold);
                (class, Confidence::RawScore(*score), None)
            }
            RawModelOutput::ClassIndex(index) => {
                let class = usize::try_from(*index).map_err(|_| {
                    DetectionError::ContractViolation(format!("negative class index {}", index))
                })?;
                (class, Confidence::NotApplicable, None)
            }
        };

        let verdict = self.labels.verdict(class).ok_or_else(|| {
            DetectionError::ContractViolation(format!(
                "class {} is outside the {} label scheme ({} classes)",
                class,
                self.labels,
                self.labels.class_count()
            ))
        })?;

        Ok(PredictionResult {
            predicted_class: class,
            verdict,
            confidence,
            probabilities,
        })
    }
}

fn describe(raw: &RawModelOutput) -> String {
    match raw {
        RawModelOutput::Logits(v) => format!("{} values", v.len()),
        RawModelOutput::Score(_) | RawModelOutput::ClassIndex(_) => "a single value".to_string(),
    }
}
