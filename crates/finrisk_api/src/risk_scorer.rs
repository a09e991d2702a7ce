//! HTTP client for the external risk-scoring computation.

use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, FinancialRecord, RiskScorer};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct RiskScorerConfig {
    /// Endpoint the records are POSTed to
    pub url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    records: &'a [FinancialRecord],
}

/// POSTs `{"records": [...]}` to the scorer and returns its JSON answer.
///
/// Scorers deployed behind a function gateway answer with an envelope
/// `{"statusCode": 200, "body": "<json string>"}`; the envelope is unwrapped
/// and the parsed body returned. Any other JSON document is returned as is.
#[derive(Clone)]
pub struct HttpRiskScorer {
    url: String,
    client: reqwest::Client,
}

impl HttpRiskScorer {
    pub fn new(config: RiskScorerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: config.url,
            client,
        }
    }
}

#[async_trait]
impl RiskScorer for HttpRiskScorer {
    async fn score(&self, records: &[FinancialRecord]) -> DomainResult<Value> {
        debug!(url = %self.url, record_count = records.len(), "calling risk scorer");

        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { records })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "risk scorer request failed");
                DomainError::RiskScoringError(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "risk scorer returned an error");
            return Err(DomainError::RiskScoringError(format!(
                "scorer returned {status}: {body}"
            )));
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|e| DomainError::RiskScoringError(format!("invalid scorer response: {e}")))?;

        unwrap_gateway_envelope(value)
    }
}

fn unwrap_gateway_envelope(value: Value) -> DomainResult<Value> {
    let Some(status_code) = value.get("statusCode").and_then(Value::as_u64) else {
        return Ok(value);
    };

    let body = value.get("body").cloned().unwrap_or(Value::Null);
    if status_code >= 400 {
        return Err(DomainError::RiskScoringError(format!(
            "scorer returned status {status_code}: {body}"
        )));
    }

    match body {
        Value::String(raw) => serde_json::from_str(&raw).map_err(|e| {
            DomainError::RiskScoringError(format!("invalid scorer response body: {e}"))
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    async fn spawn_scorer(
        status: StatusCode,
        body: Value,
        seen: Arc<Mutex<Option<Value>>>,
    ) -> String {
        let app = Router::new().route(
            "/score",
            post(move |Json(request): Json<Value>| {
                let body = body.clone();
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = Some(request);
                    (status, Json(body))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}/score")
    }

    fn scorer(url: String) -> HttpRiskScorer {
        HttpRiskScorer::new(RiskScorerConfig {
            url,
            timeout: Duration::from_secs(5),
        })
    }

    fn records() -> Vec<FinancialRecord> {
        vec![FinancialRecord::new("ACME", "2024-Q1").with_field("revenue", json!(10))]
    }

    #[tokio::test]
    async fn test_score_sends_records_and_returns_plain_json() {
        let seen = Arc::new(Mutex::new(None));
        let url = spawn_scorer(
            StatusCode::OK,
            json!([{"company_id": "ACME", "risk_score": 0.3}]),
            seen.clone(),
        )
        .await;

        let result = scorer(url).score(&records()).await.unwrap();
        assert_eq!(result, json!([{"company_id": "ACME", "risk_score": 0.3}]));

        let request = seen.lock().unwrap().clone().unwrap();
        assert_eq!(request["records"][0]["company_id"], json!("ACME"));
        assert_eq!(request["records"][0]["revenue"], json!(10));
    }

    #[tokio::test]
    async fn test_score_unwraps_gateway_envelope() {
        let envelope = json!({
            "statusCode": 200,
            "body": "{\"records\":[{\"company_id\":\"ACME\",\"risk\":\"high\"}]}"
        });
        let url = spawn_scorer(StatusCode::OK, envelope, Arc::new(Mutex::new(None))).await;

        let result = scorer(url).score(&records()).await.unwrap();
        assert_eq!(result, json!({"records": [{"company_id": "ACME", "risk": "high"}]}));
    }

    #[tokio::test]
    async fn test_envelope_error_status_is_a_scoring_error() {
        let envelope = json!({"statusCode": 500, "body": "{\"error\":\"model offline\"}"});
        let url = spawn_scorer(StatusCode::OK, envelope, Arc::new(Mutex::new(None))).await;

        let result = scorer(url).score(&records()).await;
        assert!(matches!(result, Err(DomainError::RiskScoringError(_))));
    }

    #[tokio::test]
    async fn test_http_error_status_is_a_scoring_error() {
        let url = spawn_scorer(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"message": "busy"}),
            Arc::new(Mutex::new(None)),
        )
        .await;

        match scorer(url).score(&records()).await {
            Err(DomainError::RiskScoringError(message)) => assert!(message.contains("503")),
            other => panic!("expected scoring error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_scorer_is_a_scoring_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = scorer(format!("http://{addr}/score")).score(&records()).await;
        assert!(matches!(result, Err(DomainError::RiskScoringError(_))));
    }
}
