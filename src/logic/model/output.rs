//! Raw model output and the signature it is decoded against

use serde::Serialize;

/// Uninterpreted model output, tagged by shape
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelOutput {
    /// Per-class logits, one per class
    Logits(Vec<f64>),
    /// Single scalar score
    Score(f64),
    /// Predicted class label emitted by the model itself
    ClassIndex(i64),
}

impl RawModelOutput {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawModelOutput::Logits(_) => "logits",
            RawModelOutput::Score(_) => "score",
            RawModelOutput::ClassIndex(_) => "class_index",
        }
    }
}

/// Output shape declared by the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OutputKind {
    Logits { classes: usize },
    Score,
    ClassIndex,
}

impl OutputKind {
    pub fn matches(&self, raw: &RawModelOutput) -> bool {
        match (self, raw) {
            (OutputKind::Logits { classes }, RawModelOutput::Logits(v)) => v.len() == *classes,
            (OutputKind::Score, RawModelOutput::Score(_)) => true,
            (OutputKind::ClassIndex, RawModelOutput::ClassIndex(_)) => true,
            _ => false,
        }
    }
}

/// Input/output contract read from the artifact at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSignature {
    pub input_name: String,
    pub input_width: usize,
    pub output_name: String,
    pub output_kind: OutputKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_raw_output() {
        let logits = OutputKind::Logits { classes: 3 };
        assert!(logits.matches(&RawModelOutput::Logits(vec![0.1, 0.2, 0.3])));
        assert!(!logits.matches(&RawModelOutput::Logits(vec![0.1, 0.2])));
        assert!(!logits.matches(&RawModelOutput::Score(0.3)));
        assert!(OutputKind::Score.matches(&RawModelOutput::Score(0.9)));
        assert!(OutputKind::ClassIndex.matches(&RawModelOutput::ClassIndex(2)));
        assert!(!OutputKind::ClassIndex.matches(&RawModelOutput::Score(2.0)));
    }

    #[test]
    fn test_output_kind_serializes_tagged() {
        let json = serde_json::to_value(OutputKind::Logits { classes: 3 }).unwrap();
        assert_eq!(json["kind"], "logits");
        assert_eq!(json["classes"], 3);
        let json = serde_json::to_value(OutputKind::ClassIndex).unwrap();
        assert_eq!(json["kind"], "class_index");
    }
}
