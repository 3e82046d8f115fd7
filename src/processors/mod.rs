//! Bundle processing with placeholder protection

pub mod bundle;
pub mod placeholder;
