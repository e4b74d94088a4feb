//! Step runner models

pub mod account;
pub mod record;

// Re-export for convenience
pub use account::AccountConfig;
pub use record::SessionRecord;
