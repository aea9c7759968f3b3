//! Per-frame tunnel motion.
//!
//! Spin is recomputed from total elapsed time every frame, so dropped or late
//! frames never accumulate drift. Axial travel is a fixed step per frame: the
//! tunnel moves faster on a faster display.
// TODO: scale `row_step` by frame delta once the config exposes a speed in units per second.

use procgen::TunnelScene;
use std::f64::consts::TAU;
use std::time::Duration;

/// Tunnel spin for a given elapsed time, in `[0, 2π)`.
pub fn spin_angle(elapsed: Duration, angular_speed: f32) -> f32 {
    let angle = (elapsed.as_secs_f64() * angular_speed as f64).rem_euclid(TAU) as f32;
    // The f64 → f32 cast can round up to exactly 2π.
    if angle >= std::f32::consts::TAU {
        0.0
    } else {
        angle
    }
}

/// Motion constants applied once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animator {
    /// Radians per second around the tunnel axis.
    pub angular_speed: f32,
    /// Axial distance per frame.
    pub row_step: f32,
}

impl Animator {
    pub fn apply(&self, scene: &mut TunnelScene, elapsed: Duration) {
        scene.set_spin(spin_angle(elapsed, self.angular_speed));
        scene.advance_rows(self.row_step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen::{BrickTextureConfig, BrickTextureGenerator, TunnelParams};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene() -> TunnelScene {
        let mut rng = StdRng::seed_from_u64(17);
        let texture = BrickTextureGenerator::new(BrickTextureConfig::default()).generate(&mut rng);
        TunnelScene::build(&TunnelParams::default(), &texture, &mut rng)
    }

    #[test]
    fn spin_is_pure_function_of_elapsed() {
        let t = Duration::from_millis(12_345);
        assert_eq!(spin_angle(t, 0.1), spin_angle(t, 0.1));

        let a = Animator { angular_speed: 0.4, row_step: 0.5 };
        let mut s = scene();
        a.apply(&mut s, Duration::from_secs(1));
        a.apply(&mut s, Duration::from_secs(90));
        a.apply(&mut s, t);
        let after_history = s.spin();

        let mut fresh = scene();
        a.apply(&mut fresh, t);
        assert_eq!(after_history, fresh.spin());
    }

    #[test]
    fn spin_wraps_into_full_turn() {
        for secs in [0u64, 1, 62, 63, 1_000, 86_400] {
            let angle = spin_angle(Duration::from_secs(secs), 0.1);
            assert!((0.0..std::f32::consts::TAU).contains(&angle));
        }
        let full_turn = Duration::from_secs_f64(TAU);
        assert!(spin_angle(full_turn, 1.0) < 1e-4 || spin_angle(full_turn, 1.0) > 6.2831);
    }

    #[test]
    fn rows_stay_within_tunnel_for_any_step() {
        let mut s = scene();
        let total = s.total_depth();
        for step in [0.25f32, 3.7, 10.0, 239.9, 480.0, -2.5] {
            let a = Animator { angular_speed: 0.1, row_step: step };
            for frame in 0..500u64 {
                a.apply(&mut s, Duration::from_millis(frame * 16));
                assert!(s.row_depths().all(|d| (0.0..total).contains(&d)));
            }
        }
    }

    #[test]
    fn fixed_step_per_frame_regardless_of_time() {
        let mut s = scene();
        let before: Vec<f32> = s.row_depths().collect();
        let a = Animator { angular_speed: 0.1, row_step: 0.5 };
        // Same elapsed time twice still moves rows twice.
        a.apply(&mut s, Duration::from_secs(1));
        a.apply(&mut s, Duration::from_secs(1));
        let total = s.total_depth();
        for (b, d) in before.iter().zip(s.row_depths()) {
            let expected = (b + 1.0).rem_euclid(total);
            assert!((d - expected).abs() < 1e-3);
        }
    }
}
