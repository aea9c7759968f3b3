//! Backdrop configuration (window, tunnel shape, animation). Loaded from backdrop.ron at startup.

use crate::animation::Animator;
use glam::Vec3;
use procgen::{BrickTextureConfig, TunnelParams, DEFAULT_MAX_TILT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent backdrop settings. Loaded from `backdrop.ron` in the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackdropConfig {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Enable vsync. The row step is per frame, so this also fixes the travel speed.
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Fixed seed for a reproducible tunnel. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Write the generated brick texture to this PNG path.
    #[serde(default)]
    pub export_texture: Option<PathBuf>,
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_true() -> bool {
    true
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            vsync: default_true(),
            seed: None,
            export_texture: None,
            tunnel: TunnelConfig::default(),
        }
    }
}

/// Tunnel shape, texture and motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Polygon sides.
    pub walls: u32,
    /// Depth rows per wall.
    pub rows: u32,
    /// Units per row.
    pub row_width: u32,
    /// World size of one unit.
    pub unit_size: f32,
    /// Texels per unit in the brick texture.
    pub texel_unit: u32,
    /// Seam inset in texels.
    pub seam: u32,
    pub base_height: f32,
    /// Radians.
    pub max_tilt: f32,
    /// Radians per second around the tunnel axis.
    pub spin_speed: f32,
    /// Axial distance per frame.
    pub row_step: f32,
    pub fov_degrees: f32,
    pub brick_color: [f32; 3],
    pub seam_color: [f32; 3],
    pub fog_color: [f32; 3],
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            walls: 5,
            rows: 24,
            row_width: 6,
            unit_size: 10.0,
            texel_unit: 16,
            seam: 1,
            base_height: 3.0,
            max_tilt: DEFAULT_MAX_TILT,
            spin_speed: 0.1,
            row_step: 0.25,
            fov_degrees: 75.0,
            brick_color: [0.62, 0.66, 0.78],
            seam_color: [0.04, 0.04, 0.06],
            fog_color: [0.0, 0.0, 0.0],
        }
    }
}

impl TunnelConfig {
    /// Clamp values that would produce a degenerate tunnel. Logs every correction.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.walls < 3 {
            log::warn!("walls = {} cannot close a polygon, using 3", self.walls);
            self.walls = 3;
        }
        if self.rows == 0 {
            log::warn!("rows = 0, using {}", defaults.rows);
            self.rows = defaults.rows;
        }
        if self.row_width == 0 {
            log::warn!("row_width = 0, using {}", defaults.row_width);
            self.row_width = defaults.row_width;
        }
        if !self.unit_size.is_finite() || self.unit_size <= 0.0 {
            log::warn!(
                "unit_size = {} must be positive and finite, using {}",
                self.unit_size,
                defaults.unit_size
            );
            self.unit_size = defaults.unit_size;
        }
        if !self.base_height.is_finite() || self.base_height < 0.0 {
            log::warn!(
                "base_height = {} invalid, using {}",
                self.base_height,
                defaults.base_height
            );
            self.base_height = defaults.base_height;
        }
        if !self.max_tilt.is_finite() {
            log::warn!("max_tilt = {} invalid, using {}", self.max_tilt, defaults.max_tilt);
            self.max_tilt = defaults.max_tilt;
        }
        if !self.spin_speed.is_finite() {
            log::warn!("spin_speed = {} invalid, using {}", self.spin_speed, defaults.spin_speed);
            self.spin_speed = defaults.spin_speed;
        }
        if !self.row_step.is_finite() {
            log::warn!("row_step = {} invalid, using {}", self.row_step, defaults.row_step);
            self.row_step = defaults.row_step;
        }
        if !self.fov_degrees.is_finite() || !(1.0..179.0).contains(&self.fov_degrees) {
            log::warn!(
                "fov_degrees = {} invalid, using {}",
                self.fov_degrees,
                defaults.fov_degrees
            );
            self.fov_degrees = defaults.fov_degrees;
        }
        // The half-unit stagger must land on a whole texel.
        if self.texel_unit < 2 || self.texel_unit % 2 != 0 {
            let even = (self.texel_unit.max(2) + 1) & !1;
            log::warn!(
                "texel_unit = {} must be even and at least 2, using {}",
                self.texel_unit,
                even
            );
            self.texel_unit = even;
        }
        self
    }

    pub fn params(&self) -> TunnelParams {
        TunnelParams {
            walls: self.walls,
            rows: self.rows,
            row_width: self.row_width,
            unit_size: self.unit_size,
            base_height: self.base_height,
            max_tilt: self.max_tilt,
        }
    }

    pub fn texture_config(&self) -> BrickTextureConfig {
        BrickTextureConfig {
            walls: self.walls,
            rows: self.rows,
            row_width: self.row_width,
            texel_unit: self.texel_unit,
            seam: self.seam,
            fill_color: Vec3::from(self.brick_color),
            seam_color: Vec3::from(self.seam_color),
            ..Default::default()
        }
    }

    pub fn animator(&self) -> Animator {
        Animator {
            angular_speed: self.spin_speed,
            row_step: self.row_step,
        }
    }
}

impl BackdropConfig {
    /// Load config from `backdrop.ron`. If the file is invalid, returns default config;
    /// if it is missing, writes the defaults out so they can be edited.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            let config = Self::default();
            config.save();
            return config;
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(data) = std::fs::read_to_string(path) {
            match Self::parse(&data) {
                Ok(c) => return c,
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    pub fn parse(data: &str) -> Result<Self, ron::error::SpannedError> {
        let mut config: Self = ron::from_str(data)?;
        config.tunnel = config.tunnel.sanitized();
        Ok(config)
    }

    /// Save current config to `backdrop.ron`. Logs on error.
    pub fn save(&self) {
        let path = config_path();
        if let Ok(s) = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            if let Err(e) = std::fs::write(&path, s) {
                log::warn!("Could not write config to {:?}: {}", path, e);
            }
        }
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("backdrop.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_reference_tunnel() {
        let params = BackdropConfig::default().tunnel.params();
        assert_eq!(params.rows, 24);
        assert_eq!(params.unit_size, 10.0);
        assert_eq!(params.walls, 5);
        assert_eq!(params.row_width, 6);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = BackdropConfig::parse("(vsync: false, tunnel: (walls: 8, seam: 2))").unwrap();
        assert!(!config.vsync);
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.tunnel.walls, 8);
        assert_eq!(config.tunnel.seam, 2);
        assert_eq!(config.tunnel.rows, 24);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn seed_and_export_path_parse() {
        let config =
            BackdropConfig::parse(r#"(seed: Some(7), export_texture: Some("bricks.png"))"#)
                .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.export_texture, Some(PathBuf::from("bricks.png")));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let config =
            BackdropConfig::parse("(tunnel: (walls: 2, rows: 0, unit_size: -1.0))").unwrap();
        assert_eq!(config.tunnel.walls, 3);
        assert_eq!(config.tunnel.rows, 24);
        assert_eq!(config.tunnel.unit_size, 10.0);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let config = BackdropConfig::parse(concat!(
            "(tunnel: (row_step: inf, spin_speed: NaN, unit_size: inf, ",
            "base_height: inf, max_tilt: NaN))",
        ))
        .unwrap();
        let defaults = TunnelConfig::default();
        assert_eq!(config.tunnel.row_step, defaults.row_step);
        assert_eq!(config.tunnel.spin_speed, defaults.spin_speed);
        assert_eq!(config.tunnel.unit_size, defaults.unit_size);
        assert_eq!(config.tunnel.base_height, defaults.base_height);
        assert_eq!(config.tunnel.max_tilt, defaults.max_tilt);
    }

    #[test]
    fn infinite_row_step_keeps_rows_in_range() {
        use procgen::{BrickTextureGenerator, TunnelScene};
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use std::time::Duration;

        let tunnel = BackdropConfig::parse("(tunnel: (row_step: inf))").unwrap().tunnel;
        let mut rng = StdRng::seed_from_u64(3);
        let texture = BrickTextureGenerator::new(tunnel.texture_config()).generate(&mut rng);
        let mut scene = TunnelScene::build(&tunnel.params(), &texture, &mut rng);
        tunnel.animator().apply(&mut scene, Duration::from_millis(16));
        let total = scene.total_depth();
        assert!(total.is_finite());
        assert!(scene.row_depths().all(|d| (0.0..total).contains(&d)));
    }

    #[test]
    fn odd_texel_unit_rounds_up_to_even() {
        let config = BackdropConfig::parse("(tunnel: (texel_unit: 15))").unwrap();
        assert_eq!(config.tunnel.texel_unit, 16);
        let config = BackdropConfig::parse("(tunnel: (texel_unit: 1))").unwrap();
        assert_eq!(config.tunnel.texel_unit, 2);
        let config = BackdropConfig::parse("(tunnel: (texel_unit: 8))").unwrap();
        assert_eq!(config.tunnel.texel_unit, 8);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("backdrop-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("backdrop.ron");
        std::fs::write(&path, "(walls: ").unwrap();
        let config = BackdropConfig::load_from(&path);
        assert_eq!(config.tunnel, TunnelConfig::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_format_round_trips() {
        let mut config = BackdropConfig::default();
        config.seed = Some(99);
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let parsed = BackdropConfig::parse(&text).unwrap();
        assert_eq!(parsed.seed, Some(99));
        assert_eq!(parsed.tunnel, config.tunnel);
    }
}
