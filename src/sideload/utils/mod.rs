//! Shared helpers for the sideload pipeline.

pub mod fs;
