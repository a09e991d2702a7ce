mod logging;
mod trace;

pub use logging::*;
pub use trace::*;
