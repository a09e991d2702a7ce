mod consumer;
pub mod middleware;
mod trace_context;
mod types;

pub use consumer::*;
pub use trace_context::*;
pub use types::*;
