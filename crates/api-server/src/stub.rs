//! Development analysis engine
//!
//! Stands in for the real model-backed engine so the server can be run and
//! exercised end-to-end without any models present. Analyzes in fixed-length
//! simulated segments, reports progress per segment, and honors cancellation
//! between segments. Production deployments wire their own
//! [`AnalysisEngine`] into [`crate::ApiState`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use video_session_common::{AnalysisRequest, AnalysisType, EngineError};
use video_session_orchestrator::{AnalysisEngine, ProgressReporter};

/// Deterministic stand-in engine with a configurable simulated duration
#[derive(Debug, Clone)]
pub struct StubEngine {
    /// Number of simulated analysis segments
    pub segments: u32,
    /// Wall-clock time spent per segment
    pub segment_delay: Duration,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self {
            segments: 8,
            segment_delay: Duration::from_millis(250),
        }
    }
}

impl AnalysisEngine for StubEngine {
    fn execute(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, EngineError> {
        for segment in 0..self.segments {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            std::thread::sleep(self.segment_delay);
            progress.report(
                f64::from(segment + 1) / f64::from(self.segments),
                &format!("Analyzing segment {}/{}", segment + 1, self.segments),
            );
        }

        Ok(match request.analysis_type {
            AnalysisType::Highlights => highlights_payload(&request.parameters),
            AnalysisType::Workout => workout_payload(&request.parameters),
        })
    }
}

fn int_param(parameters: &serde_json::Value, key: &str, default: i64) -> i64 {
    parameters.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

fn highlights_payload(parameters: &serde_json::Value) -> serde_json::Value {
    let min_significance = int_param(parameters, "min_significance", 6);
    let max_highlights = int_param(parameters, "max_highlights", 10);

    let candidates = [
        (4.0, 9, "Dramatic scene change"),
        (21.5, 7, "Key object enters frame"),
        (58.0, 6, "Notable movement sequence"),
        (92.5, 5, "Minor transition"),
    ];
    let highlights: Vec<serde_json::Value> = candidates
        .iter()
        .filter(|(_, significance, _)| i64::from(*significance) >= min_significance)
        .take(usize::try_from(max_highlights.max(0)).unwrap_or(usize::MAX))
        .map(|(timestamp, significance, description)| {
            serde_json::json!({
                "timestamp": timestamp,
                "significance": significance,
                "description": description,
            })
        })
        .collect();

    serde_json::json!({
        "analysis_type": "highlights",
        "min_significance": min_significance,
        "highlights": highlights,
    })
}

fn workout_payload(parameters: &serde_json::Value) -> serde_json::Value {
    let segment_duration = int_param(parameters, "segment_duration", 15);

    serde_json::json!({
        "analysis_type": "workout",
        "segment_duration": segment_duration,
        "exercises": [
            {"start": 0, "end": segment_duration, "movement": "warm-up"},
            {"start": segment_duration, "end": segment_duration * 3, "movement": "squat set"},
            {"start": segment_duration * 3, "end": segment_duration * 4, "movement": "rest"},
        ],
    })
}
