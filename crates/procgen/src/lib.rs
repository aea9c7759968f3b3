//! Procedural generation for the tunnel: brick texture and wall geometry.

pub mod bricks;
pub mod tunnel;

pub use bricks::*;
pub use tunnel::*;
