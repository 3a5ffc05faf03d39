//! Numeric slider descriptors exposed by preprocessors

use crate::error::PreprocessorError;
use serde::{Deserialize, Serialize};

/// One numeric UI control: its label, range, default value and step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorParameter {
    pub label: String,
    pub minimum: f32,
    pub maximum: f32,
    /// Default value shown by the UI
    pub value: f32,
    pub step: f32,
    pub visible: bool,
}

impl PreprocessorParameter {
    pub fn new(
        label: impl Into<String>,
        minimum: f32,
        maximum: f32,
        value: f32,
        step: f32,
    ) -> Self {
        Self {
            label: label.into(),
            minimum,
            maximum,
            value,
            step,
            visible: true,
        }
    }

    /// Whether `value` is inside the range and on the step grid
    pub fn contains(&self, value: f32) -> bool {
        if !value.is_finite() || value < self.minimum || value > self.maximum {
            return false;
        }
        if self.step <= 0.0 {
            return true;
        }
        let steps = (value - self.minimum) / self.step;
        (steps - steps.round()).abs() < 1e-4
    }

    /// Check a user-supplied value; UI layers call this before invoking a preprocessor
    pub fn validate(&self, value: f32) -> Result<f32, PreprocessorError> {
        if self.contains(value) {
            return Ok(value);
        }
        let reason = if value < self.minimum || value > self.maximum || !value.is_finite() {
            format!("expected a value in [{}, {}]", self.minimum, self.maximum)
        } else {
            format!("expected a multiple of {} from {}", self.step, self.minimum)
        };
        Err(PreprocessorError::InvalidParameter {
            label: self.label.clone(),
            value,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_respects_range_and_step() {
        let resolution = PreprocessorParameter::new("Resolution", 128.0, 2048.0, 768.0, 8.0);
        assert!(resolution.contains(128.0));
        assert!(resolution.contains(768.0));
        assert!(resolution.contains(2048.0));
        assert!(!resolution.contains(130.0));
        assert!(!resolution.contains(120.0));
        assert!(!resolution.contains(2056.0));
        assert!(!resolution.contains(f32::NAN));
    }

    #[test]
    fn test_validate_reports_label() {
        let steps = PreprocessorParameter::new("Steps", 1.0, 50.0, 20.0, 1.0);
        assert_eq!(steps.validate(20.0).unwrap(), 20.0);

        let err = steps.validate(0.0).unwrap_err();
        match err {
            PreprocessorError::InvalidParameter { label, value, .. } => {
                assert_eq!(label, "Steps");
                assert_eq!(value, 0.0);
            }
            other => panic!("Expected InvalidParameter, got {other:?}"),
        }
    }
}
