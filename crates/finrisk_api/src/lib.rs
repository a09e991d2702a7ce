pub mod domain;
pub mod finrisk_api;
pub mod http;
pub mod risk_scorer;

pub use domain::*;
pub use finrisk_api::*;
pub use http::*;
pub use risk_scorer::*;
