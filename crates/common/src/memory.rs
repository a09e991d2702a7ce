mod id_generator;
mod ledger_store;
mod message_queue;

pub use id_generator::*;
pub use ledger_store::*;
pub use message_queue::*;
