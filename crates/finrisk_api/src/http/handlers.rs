use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::domain::{Batch, FinancialRecord, RecordFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ApiError, Authenticated, FinriskApiServices};
use crate::domain::SubmitBatchInput;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub batch_id: String,
    pub status_endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct RiskAssessmentResponse {
    pub message: &'static str,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusQuery {
    pub batch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RiskAssessmentQuery {
    pub company_id: Option<String>,
    pub reporting_period: Option<String>,
    pub industry_sector: Option<String>,
}

impl From<RiskAssessmentQuery> for RecordFilter {
    fn from(query: RiskAssessmentQuery) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        RecordFilter {
            company_id: present(query.company_id),
            reporting_period: present(query.reporting_period),
            industry_sector: present(query.industry_sector),
        }
    }
}

pub async fn health() -> &'static str {
    "Financial Risk API is running"
}

pub async fn upload_financial_data(
    State(services): State<FinriskApiServices>,
    Authenticated(caller): Authenticated,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !body.is_array() {
        return Err(ApiError::BadRequest(
            "Request body must be a JSON array of financial records".to_string(),
        ));
    }

    let records: Vec<FinancialRecord> = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid financial record: {}", e)))?;

    debug!(user_id = %caller.user_id, record_count = records.len(), "upload received");

    let submitted = services
        .ingestion
        .submit(SubmitBatchInput { records })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            message: "Data queued for processing.",
            batch_id: submitted.batch_id,
            status_endpoint: submitted.status_endpoint,
        }),
    ))
}

pub async fn batch_status(
    State(services): State<FinriskApiServices>,
    Authenticated(_caller): Authenticated,
    Query(query): Query<BatchStatusQuery>,
) -> Result<Json<Batch>, ApiError> {
    let batch_id = query
        .batch_id
        .ok_or_else(|| ApiError::BadRequest("batch_id query parameter is required".to_string()))?;

    let batch = services.batch_status.get_status(&batch_id).await?;
    Ok(Json(batch))
}

pub async fn risk_assessment(
    State(services): State<FinriskApiServices>,
    Authenticated(_caller): Authenticated,
    Query(query): Query<RiskAssessmentQuery>,
) -> Result<Json<RiskAssessmentResponse>, ApiError> {
    let data = services.risk_assessment.assess(query.into()).await?;

    Ok(Json(RiskAssessmentResponse {
        message: "Risk assessment completed.",
        data,
    }))
}
