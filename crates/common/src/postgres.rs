mod batch_repository;
mod client;
mod config;
mod financial_record_repository;
mod migration;

pub use batch_repository::*;
pub use client::*;
pub use config::*;
pub use financial_record_repository::*;
pub use migration::*;
