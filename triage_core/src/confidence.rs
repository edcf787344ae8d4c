//! Hypothesis confidence
//!
//! A [`Confidence`] is a probability in `[0.0, 1.0]` that a hypothesis names
//! the real root cause. Values are produced from a prior by folding in one
//! piece of evidence at a time with [`Confidence::weigh`]; deserialization
//! rejects anything outside the range so a tampered record cannot smuggle in
//! an invalid score.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Likelihood spread used when turning a strength into a likelihood ratio.
/// Full-strength evidence is 9x as likely under the hypothesis as without it.
const SPREAD: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfidenceError {
    #[error("confidence is NaN")]
    NaN,

    #[error("confidence {0} outside [0, 1]")]
    OutOfRange(f64),
}

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    pub fn new(value: f64) -> Result<Self, ConfidenceError> {
        if value.is_nan() {
            Err(ConfidenceError::NaN)
        } else if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceError::OutOfRange(value))
        }
    }

    /// Clamp into range; NaN maps to zero.
    pub fn saturating(value: f64) -> Self {
        Self::new(value.clamp(0.0, 1.0)).unwrap_or(Self::ZERO)
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Fold one piece of evidence into the value.
    ///
    /// `strength` lies in `[-1.0, 1.0]`: positive supports the hypothesis,
    /// negative counts against it and zero is neutral. The update is Bayes'
    /// rule in odds form with likelihoods `0.5 ± 0.4·strength`, so the result
    /// never leaves the open interval when the input is inside it.
    pub fn weigh(self, strength: f64) -> Self {
        let s = if strength.is_nan() { 0.0 } else { strength.clamp(-1.0, 1.0) };
        let for_h = 0.5 + SPREAD * s;
        let against_h = 0.5 - SPREAD * s;
        let evidence = for_h * self.0 + against_h * (1.0 - self.0);
        if evidence <= f64::EPSILON {
            return self;
        }
        Self::saturating(for_h * self.0 / evidence)
    }

    pub fn capped(self, ceiling: f64) -> Self {
        Self::saturating(self.0.min(ceiling))
    }

    /// Total order for ranking; values are never NaN.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}
