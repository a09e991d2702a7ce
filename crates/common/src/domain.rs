mod batch;
mod id_generator;
mod identity;
mod queue;
mod record;
mod repository;
mod result;
mod risk;

pub use batch::*;
pub use id_generator::*;
pub use identity::*;
pub use queue::*;
pub use record::*;
pub use repository::*;
pub use result::*;
pub use risk::*;
