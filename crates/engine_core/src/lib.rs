//! Core engine types and utilities for the tunnel backdrop.
//!
//! This crate provides the foundational types used across all backdrop systems:
//! - Transform and spatial helpers
//! - Frame timing
//! - Host capabilities: random source, frame scheduling, resize notifications

pub mod random;
pub mod schedule;
pub mod signal;
pub mod time;
pub mod transform;

pub use random::*;
pub use schedule::*;
pub use signal::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
