//! Built-in tasks.

pub mod reach;

pub use reach::ReachTarget;
