mod batch_ingestion_service;
mod batch_status_service;
mod risk_assessment_service;

pub use batch_ingestion_service::*;
pub use batch_status_service::*;
pub use risk_assessment_service::*;
