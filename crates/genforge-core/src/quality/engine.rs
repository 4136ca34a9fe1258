//! Closed-loop evaluate, detect and repair.

use tracing::{debug, info};

use super::evaluate::evaluate;
use super::repair::{detect_issues, fix_issues};
use super::types::{EnhanceReport, QualityIssue, RepairOutcome};
use crate::config::QualityDefaults;

/// Scores generator output and repairs it when it falls below the threshold.
#[derive(Debug, Clone)]
pub struct QualityEngine {
    min_score: f64,
    max_passes: usize,
}

impl Default for QualityEngine {
    fn default() -> Self {
        Self {
            min_score: QualityDefaults::MIN_SCORE,
            max_passes: QualityDefaults::REPAIR_PASSES,
        }
    }
}

impl QualityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow up to `passes` detect-and-fix rounds, clamped to
    /// `1..=QualityDefaults::MAX_REPAIR_PASSES`.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.clamp(1, QualityDefaults::MAX_REPAIR_PASSES);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score.clamp(0.0, QualityDefaults::MAX_SCORE);
        self
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    pub fn evaluate(&self, output: &str) -> f64 {
        evaluate(output)
    }

    pub fn detect_issues(&self, output: &str) -> Vec<QualityIssue> {
        detect_issues(output)
    }

    pub fn fix_issues(
        &self,
        output: &str,
        issues: &[QualityIssue],
        original_prompt: &str,
    ) -> RepairOutcome {
        fix_issues(output, issues, original_prompt)
    }

    /// Evaluate and, below the threshold, repair.
    ///
    /// Passes stop once the score meets the threshold, nothing is left to
    /// detect, or the pass limit is reached.
    pub fn enhance(&self, output: &str, original_prompt: &str) -> EnhanceReport {
        let initial = evaluate(output);
        info!("Quality score: {:.1}/10", initial);

        if initial >= self.min_score {
            return EnhanceReport {
                enhanced: output.to_string(),
                score: initial,
                improvements: Vec::new(),
                passes: 0,
            };
        }

        let mut enhanced = output.to_string();
        let mut score = initial;
        let mut improvements = Vec::new();
        let mut passes = 0;

        while passes < self.max_passes {
            let issues = detect_issues(&enhanced);
            if issues.is_empty() {
                debug!("No repairable issues left at score {:.1}", score);
                break;
            }

            passes += 1;
            debug!("Repair pass {}: {} issue(s)", passes, issues.len());
            let outcome = fix_issues(&enhanced, &issues, original_prompt);
            enhanced = outcome.fixed;
            improvements.extend(outcome.improvements);
            score = evaluate(&enhanced);

            if score >= self.min_score {
                break;
            }
        }

        info!(
            "Quality score after repair: {:.1}/10 ({} improvement(s), {} pass(es))",
            score,
            improvements.len(),
            passes
        );

        EnhanceReport {
            enhanced,
            score,
            improvements,
            passes,
        }
    }
}
