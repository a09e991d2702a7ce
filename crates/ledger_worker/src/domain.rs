mod batch_writer;
mod dead_letter_reconciler;

pub use batch_writer::*;
pub use dead_letter_reconciler::*;
