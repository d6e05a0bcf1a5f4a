//! rclink Library
//!
//! Remote-control client for a networked vehicle controller. The binary
//! loads settings, connects and hands control to the headless driver.

pub mod headless;

// Re-export main entry points
pub use headless::runner::run_headless;
