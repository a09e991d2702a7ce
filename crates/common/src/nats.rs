mod client;
mod jetstream_queue;

pub use client::*;
pub use jetstream_queue::*;
