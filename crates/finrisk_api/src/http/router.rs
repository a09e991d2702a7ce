use axum::routing::{get, post};
use axum::Router;
use common::domain::IdentityProvider;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::HasIdentityProvider;
use crate::domain::{BatchIngestionService, BatchStatusService, RiskAssessmentService};

/// Services backing the HTTP API, shared by every handler
#[derive(Clone)]
pub struct FinriskApiServices {
    pub ingestion: Arc<BatchIngestionService>,
    pub batch_status: Arc<BatchStatusService>,
    pub risk_assessment: Arc<RiskAssessmentService>,
    pub identity_provider: Arc<dyn IdentityProvider>,
}

impl HasIdentityProvider for FinriskApiServices {
    fn identity_provider(&self) -> Arc<dyn IdentityProvider> {
        self.identity_provider.clone()
    }
}

pub fn build_router(services: FinriskApiServices) -> Router {
    let finance = Router::new()
        .route("/uploadFinancialData", post(handlers::upload_financial_data))
        .route("/batch-status", get(handlers::batch_status))
        .route("/getRiskAssessment", get(handlers::risk_assessment));

    Router::new()
        .route("/", get(handlers::health))
        .nest("/api/v1/finance", finance)
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}
