pub mod consumer;
pub mod domain;
pub mod ledger_worker;

pub use consumer::*;
pub use domain::*;
pub use ledger_worker::*;
