//! Trackpick - batch audio/subtitle track trimming for Matroska files
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod config;
pub mod inventory;
pub mod resources;
