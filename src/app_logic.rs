/*
 * This module provides the application logic layer, centered around
 * `PackSession`, which orchestrates one packing session over the core engine:
 * loading listings, applying selection changes, and rendering the pack.
 * Unit tests for `PackSession` are in `session_tests.rs`.
 */
pub mod session;

#[cfg(test)]
mod session_tests;

pub use session::PackSession;
