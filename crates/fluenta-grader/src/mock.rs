//! Mock grader for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use fluenta_core::traits::{GradeRequest, GradeResponse, Grader};

use crate::error::GraderError;

/// A mock grader for exercising the engine without a real scoring service.
///
/// Returns a configurable fixed band and can fail the first N calls to
/// drive the engine's retry path.
pub struct MockGrader {
    /// Band returned for every rubric dimension.
    band: f64,
    /// Fail this many calls before succeeding.
    failures_before_success: AtomicU32,
    /// Whether injected failures look permanent or transient.
    fail_permanently: bool,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<GradeRequest>>,
}

impl MockGrader {
    /// A grader that always returns `band` on every dimension.
    pub fn with_fixed_band(band: f64) -> Self {
        Self {
            band,
            failures_before_success: AtomicU32::new(0),
            fail_permanently: false,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the first `n` calls with a transient error, then succeed.
    pub fn failing_then_succeeding(n: u32, band: f64) -> Self {
        Self {
            band,
            failures_before_success: AtomicU32::new(n),
            fail_permanently: false,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail every call with a permanent authentication error.
    pub fn always_failing_permanently() -> Self {
        Self {
            band: 0.0,
            failures_before_success: AtomicU32::new(u32::MAX),
            fail_permanently: true,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail every call with a transient error.
    pub fn always_failing_transiently() -> Self {
        Self {
            band: 0.0,
            failures_before_success: AtomicU32::new(u32::MAX),
            fail_permanently: false,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Number of calls made to this grader.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request this grader received.
    pub fn last_request(&self) -> Option<GradeRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Grader for MockGrader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let remaining = self.failures_before_success.load(Ordering::Relaxed);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_before_success
                    .fetch_sub(1, Ordering::Relaxed);
            }
            if self.fail_permanently {
                return Err(GraderError::AuthenticationFailed("mock".into()).into());
            }
            return Err(GraderError::Timeout(1).into());
        }

        let scores: BTreeMap<String, f64> = request
            .skill
            .rubric_dimensions()
            .iter()
            .map(|d| (d.to_string(), self.band))
            .collect();

        Ok(GradeResponse {
            scores,
            overall: self.band,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluenta_core::model::Skill;

    fn speaking_request() -> GradeRequest {
        GradeRequest {
            skill: Skill::Speaking,
            prompt: "Talk about your weekend.".into(),
            submission: "On Saturday I went hiking...".into(),
        }
    }

    #[tokio::test]
    async fn fixed_band() {
        let grader = MockGrader::with_fixed_band(6.5);
        let response = grader.grade(&speaking_request()).await.unwrap();
        assert_eq!(response.overall, 6.5);
        assert_eq!(response.scores.len(), 4);
        assert_eq!(response.scores["fluency"], 6.5);
        assert_eq!(grader.call_count(), 1);
    }

    #[tokio::test]
    async fn fails_then_succeeds() {
        let grader = MockGrader::failing_then_succeeding(2, 7.0);
        assert!(grader.grade(&speaking_request()).await.is_err());
        assert!(grader.grade(&speaking_request()).await.is_err());
        let response = grader.grade(&speaking_request()).await.unwrap();
        assert_eq!(response.overall, 7.0);
        assert_eq!(grader.call_count(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_mode() {
        let grader = MockGrader::always_failing_permanently();
        let err = grader.grade(&speaking_request()).await.unwrap_err();
        let grader_err = err.downcast_ref::<GraderError>().unwrap();
        assert!(grader_err.is_permanent());
    }

    #[tokio::test]
    async fn records_last_request() {
        let grader = MockGrader::with_fixed_band(5.0);
        grader.grade(&speaking_request()).await.unwrap();
        let last = grader.last_request().unwrap();
        assert_eq!(last.skill, Skill::Speaking);
        assert!(last.submission.contains("hiking"));
    }
}
