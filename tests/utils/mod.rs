pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use setup::{stat_values, windows, TestSetup, TestSetupBuilder};
