//! HTTP grader implementation.
//!
//! Talks to a remote rubric-scoring service over a small JSON contract:
//! `POST {base_url}/v1/grade` with the skill, prompt, and submission;
//! the service answers with named sub-scores and an overall band.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

use fluenta_core::traits::{GradeRequest, GradeResponse, Grader};

use crate::error::GraderError;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Grader backed by a remote HTTP scoring service.
pub struct HttpGrader {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpGrader {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    skill: String,
    prompt: &'a str,
    submission: &'a str,
    dimensions: Vec<&'static str>,
}

#[derive(Deserialize)]
struct WireResponse {
    scores: BTreeMap<String, f64>,
    overall: f64,
}

/// Enforce the score contract: every rubric dimension present, each value
/// in [0, 9] on the half-point grid.
fn validate_scores(request: &GradeRequest, wire: &WireResponse) -> Result<(), GraderError> {
    for dim in request.skill.rubric_dimensions() {
        let value = wire.scores.get(*dim).copied().ok_or_else(|| {
            GraderError::MalformedResponse(format!("missing dimension: {dim}"))
        })?;
        if !(0.0..=9.0).contains(&value) || (value * 2.0).fract() != 0.0 {
            return Err(GraderError::MalformedResponse(format!(
                "dimension {dim} out of contract: {value}"
            )));
        }
    }
    if !(0.0..=9.0).contains(&wire.overall) {
        return Err(GraderError::MalformedResponse(format!(
            "overall out of contract: {}",
            wire.overall
        )));
    }
    Ok(())
}

#[async_trait]
impl Grader for HttpGrader {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(skill = %request.skill))]
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        let start = Instant::now();

        let body = WireRequest {
            skill: request.skill.to_string(),
            prompt: &request.prompt,
            submission: &request.submission,
            dimensions: request.skill.rubric_dimensions().to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/v1/grade", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GraderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    GraderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(GraderError::RateLimited {
                retry_after_ms: retry_after,
            }
            .into());
        }
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::AuthenticationFailed(body).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::ApiError {
                status,
                message: body,
            }
            .into());
        }

        let wire: WireResponse = response.json().await.map_err(|e| {
            GraderError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;
        validate_scores(request, &wire)?;

        tracing::debug!(
            skill = %request.skill,
            overall = wire.overall,
            latency_ms = start.elapsed().as_millis() as u64,
            "grading complete"
        );

        Ok(GradeResponse {
            scores: wire.scores,
            overall: wire.overall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluenta_core::model::Skill;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn writing_request() -> GradeRequest {
        GradeRequest {
            skill: Skill::Writing,
            prompt: "Describe a memorable journey.".into(),
            submission: "Last summer I travelled to the coast...".into(),
        }
    }

    #[tokio::test]
    async fn successful_grading() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "scores": {
                "task_achievement": 6.5,
                "coherence_cohesion": 6.0,
                "vocabulary": 7.0,
                "grammar": 6.0
            },
            "overall": 6.5
        });

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("test-key", &server.uri());
        let response = grader.grade(&writing_request()).await.unwrap();
        assert_eq!(response.overall, 6.5);
        assert_eq!(response.scores["grammar"], 6.0);
        assert_eq!(response.scores.len(), 4);
    }

    #[tokio::test]
    async fn missing_dimension_is_malformed() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "scores": {"grammar": 6.0},
            "overall": 6.0
        });

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("key", &server.uri());
        let err = grader.grade(&writing_request()).await.unwrap_err();
        let grader_err = err.downcast_ref::<GraderError>().unwrap();
        assert!(grader_err.is_permanent());
        assert!(err.to_string().contains("missing dimension"));
    }

    #[tokio::test]
    async fn off_grid_score_is_malformed() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "scores": {
                "task_achievement": 6.3,
                "coherence_cohesion": 6.0,
                "vocabulary": 7.0,
                "grammar": 6.0
            },
            "overall": 6.5
        });

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("key", &server.uri());
        let err = grader.grade(&writing_request()).await.unwrap_err();
        assert!(err.to_string().contains("out of contract"));
    }

    #[tokio::test]
    async fn auth_failure_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("bad-key", &server.uri());
        let err = grader.grade(&writing_request()).await.unwrap_err();
        let grader_err = err.downcast_ref::<GraderError>().unwrap();
        assert!(grader_err.is_permanent());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("key", &server.uri());
        let err = grader.grade(&writing_request()).await.unwrap_err();
        let grader_err = err.downcast_ref::<GraderError>().unwrap();
        assert!(!grader_err.is_permanent());
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let grader = HttpGrader::new("key", &server.uri());
        let err = grader.grade(&writing_request()).await.unwrap_err();
        match err.downcast_ref::<GraderError>().unwrap() {
            GraderError::RateLimited { retry_after_ms } => assert_eq!(*retry_after_ms, 7000),
            other => panic!("unexpected error: {other}"),
        }
    }
}
