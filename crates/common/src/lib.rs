pub mod auth;
pub mod domain;
pub mod garde;
pub mod memory;
pub mod nats;
pub mod postgres;
pub mod queue;
pub mod telemetry;

pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBatchRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockFinancialRecordRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockIdGenerator;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockIdentityProvider;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMessageQueue;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockRiskScorer;
