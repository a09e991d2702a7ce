mod batch_writer_service;
mod dead_letter_service;

pub use batch_writer_service::*;
pub use dead_letter_service::*;
