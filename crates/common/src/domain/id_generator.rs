/// Source of identifiers for batches and records.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Globally unique, time-ordered ids
#[derive(Debug, Clone, Copy, Default)]
pub struct XidGenerator;

impl IdGenerator for XidGenerator {
    fn generate(&self) -> String {
        xid::new().to_string()
    }
}
