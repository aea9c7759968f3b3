//! Procedural brick texture for the tunnel walls.
//! Paints randomized brick runs into a bitmap and keeps the matching segment layout,
//! so every 3D box can be sized from (and textured with) exactly the run it was painted as.

use engine_core::RandomSource;
use glam::Vec3;
use noise::{NoiseFn, Perlin};

/// Shortest brick run, in units.
pub const MIN_RUN: u32 = 1;
/// Longest brick run, in units.
pub const MAX_RUN: u32 = 4;

/// RGBA pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (b.clamp(0.0, 1.0) * 255.0) as u8,
            a: 255,
        }
    }

    pub fn from_color(color: Vec3) -> Self {
        Self::from_rgb(color.x, color.y, color.z)
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Generated texture data
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
}

impl TextureData {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Pixel::new(0, 0, 0, 255))
    }

    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; (width * height) as usize],
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = pixel;
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize]
        } else {
            Pixel::new(0, 0, 0, 255)
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the texture bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, pixel: Pixel) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y..y_end {
            let row = (py * self.width) as usize;
            for px in x..x_end {
                self.pixels[row + px as usize] = pixel;
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&pixel.to_bytes());
        }
        bytes
    }
}

/// One brick run along a texture row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub wall: u32,
    pub row: u32,
    /// Units from the start of the row, not counting the row's stagger.
    pub start: u32,
    /// Run length in units, `MIN_RUN..=MAX_RUN`.
    pub length: u32,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.start + self.length
    }
}

/// Per-row stagger: 0 or 1, shared by every wall. A 1 shifts the row by half a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOffsets {
    values: Vec<u8>,
}

impl RowOffsets {
    pub fn generate(rows: u32, rng: &mut dyn RandomSource) -> Self {
        Self {
            values: (0..rows).map(|_| rng.coin()).collect(),
        }
    }

    /// Build from explicit values; anything non-zero counts as 1.
    pub fn from_values(values: impl IntoIterator<Item = u8>) -> Self {
        Self {
            values: values.into_iter().map(|v| v.min(1)).collect(),
        }
    }

    pub fn get(&self, row: u32) -> u8 {
        self.values.get(row as usize).copied().unwrap_or(0)
    }

    /// Stagger of a row in units (0.0 or 0.5).
    pub fn shift_units(&self, row: u32) -> f32 {
        self.get(row) as f32 * 0.5
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }
}

/// Segments for every (wall, row), stored wall-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    walls: u32,
    rows: u32,
    row_width: u32,
    runs: Vec<Vec<Segment>>,
}

impl SegmentLayout {
    pub fn walls(&self) -> u32 {
        self.walls
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn row_width(&self) -> u32 {
        self.row_width
    }

    pub fn row(&self, wall: u32, row: u32) -> &[Segment] {
        &self.runs[(wall * self.rows + row) as usize]
    }

    pub fn segment_count(&self) -> usize {
        self.runs.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.runs.iter().flatten()
    }
}

/// Draw one run length, clamped to what is left of the row.
pub fn draw_run(rng: &mut dyn RandomSource, remaining: u32) -> u32 {
    debug_assert!(remaining >= MIN_RUN);
    rng.range_u32_inclusive(MIN_RUN, MAX_RUN).min(remaining)
}

/// Configuration for brick texture generation
#[derive(Debug, Clone)]
pub struct BrickTextureConfig {
    /// Number of walls (polygon sides).
    pub walls: u32,
    /// Depth rows per wall.
    pub rows: u32,
    /// Units per row.
    pub row_width: u32,
    /// Texels per unit, both axes. Keep it even: the half-unit stagger is
    /// `texel_unit / 2` texels, rounded down.
    pub texel_unit: u32,
    /// Inset in texels around every brick.
    pub seam: u32,
    pub fill_color: Vec3,
    pub seam_color: Vec3,
    /// Strength of the per-brick noise shading (0 = flat).
    pub weathering: f32,
}

impl Default for BrickTextureConfig {
    fn default() -> Self {
        Self {
            walls: 5,
            rows: 24,
            row_width: 6,
            texel_unit: 16,
            seam: 1,
            fill_color: Vec3::new(0.62, 0.66, 0.78),
            seam_color: Vec3::new(0.04, 0.04, 0.06),
            weathering: 0.25,
        }
    }
}

/// Bitmap plus the layout it was painted from.
#[derive(Debug, Clone)]
pub struct BrickTexture {
    pub image: TextureData,
    pub layout: SegmentLayout,
    pub offsets: RowOffsets,
    texel_unit: u32,
}

impl BrickTexture {
    pub fn texel_unit(&self) -> u32 {
        self.texel_unit
    }

    /// Outer texel rectangle `(x, y, w, h)` of a segment, seams included.
    pub fn texel_rect(&self, segment: &Segment) -> (u32, u32, u32, u32) {
        let tu = self.texel_unit;
        let x = segment.start * tu + u32::from(self.offsets.get(segment.row)) * (tu / 2);
        let y = (segment.wall * self.layout.rows + segment.row) * tu;
        (x, y, segment.length * tu, tu)
    }

    /// Normalized `[u, v, du, dv]` of a segment's rectangle.
    pub fn uv_rect(&self, segment: &Segment) -> [f32; 4] {
        let (x, y, w, h) = self.texel_rect(segment);
        let tw = self.image.width as f32;
        let th = self.image.height as f32;
        [x as f32 / tw, y as f32 / th, w as f32 / tw, h as f32 / th]
    }
}

/// Procedural brick texture generator
#[derive(Debug, Clone, Default)]
pub struct BrickTextureGenerator {
    config: BrickTextureConfig,
}

impl BrickTextureGenerator {
    pub fn new(config: BrickTextureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrickTextureConfig {
        &self.config
    }

    /// Generate the layout and paint it. Row offsets are drawn first, then runs
    /// wall by wall, row by row, then the noise seed.
    pub fn generate(&self, rng: &mut dyn RandomSource) -> BrickTexture {
        let cfg = &self.config;
        let offsets = RowOffsets::generate(cfg.rows, rng);

        let mut runs = Vec::with_capacity((cfg.walls * cfg.rows) as usize);
        for wall in 0..cfg.walls {
            for row in 0..cfg.rows {
                let mut segments = Vec::new();
                let mut start = 0;
                while start < cfg.row_width {
                    let length = draw_run(rng, cfg.row_width - start);
                    segments.push(Segment { wall, row, start, length });
                    start += length;
                }
                runs.push(segments);
            }
        }

        let layout = SegmentLayout {
            walls: cfg.walls,
            rows: cfg.rows,
            row_width: cfg.row_width,
            runs,
        };

        let width = cfg.row_width * cfg.texel_unit + cfg.texel_unit / 2;
        let height = cfg.walls * cfg.rows * cfg.texel_unit;
        let image = TextureData::filled(width, height, Pixel::from_color(cfg.seam_color));

        let mut texture = BrickTexture {
            image,
            layout,
            offsets,
            texel_unit: cfg.texel_unit,
        };

        let perlin = Perlin::new((rng.next_f32() * u32::MAX as f32) as u32);
        self.paint(&mut texture, &perlin);

        log::debug!(
            "Brick texture {}x{}: {} segments over {} walls x {} rows",
            texture.image.width,
            texture.image.height,
            texture.layout.segment_count(),
            cfg.walls,
            cfg.rows
        );

        texture
    }

    fn paint(&self, texture: &mut BrickTexture, perlin: &Perlin) {
        // Keep at least one texel of fill even with an oversized seam.
        let seam = self.config.seam.min(self.config.texel_unit.saturating_sub(1) / 2);
        let segments: Vec<Segment> = texture.layout.iter().copied().collect();

        for segment in &segments {
            let (x, y, w, h) = texture.texel_rect(segment);
            let cx = (x + w / 2) as f64;
            let cy = (y + h / 2) as f64;
            let shade = self.weathering(perlin, cx, cy);
            let pixel = Pixel::from_color(self.config.fill_color * shade);
            texture.image.fill_rect(
                x + seam,
                y + seam,
                w.saturating_sub(seam * 2),
                h.saturating_sub(seam * 2),
                pixel,
            );
        }
    }

    /// Brightness multiplier around 1.0 from low-frequency noise.
    fn weathering(&self, perlin: &Perlin, x: f64, y: f64) -> f32 {
        let mut value = 0.0;
        let mut amplitude = 0.5;
        let mut frequency = 0.02;

        for _ in 0..3 {
            value += amplitude * (perlin.get([x * frequency, y * frequency]) * 0.5 + 0.5);
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        let n = (value / 0.875).clamp(0.0, 1.0) as f32;
        1.0 - self.config.weathering * 0.5 + self.config.weathering * n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::SequenceRandom;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> BrickTextureConfig {
        BrickTextureConfig {
            walls: 3,
            rows: 8,
            row_width: 7,
            texel_unit: 8,
            seam: 1,
            ..Default::default()
        }
    }

    #[test]
    fn rows_cover_exact_width() {
        let generator = BrickTextureGenerator::new(small_config());
        for seed in 0..20 {
            let texture = generator.generate(&mut StdRng::seed_from_u64(seed));
            let layout = &texture.layout;
            for wall in 0..layout.walls() {
                for row in 0..layout.rows() {
                    let segments = layout.row(wall, row);
                    let total: u32 = segments.iter().map(|s| s.length).sum();
                    assert_eq!(total, layout.row_width());
                    // Contiguous: each run starts where the previous ended.
                    let mut cursor = 0;
                    for s in segments {
                        assert_eq!(s.start, cursor);
                        cursor = s.end();
                    }
                }
            }
        }
    }

    #[test]
    fn run_lengths_stay_in_range() {
        let generator = BrickTextureGenerator::new(small_config());
        let texture = generator.generate(&mut StdRng::seed_from_u64(11));
        assert!(texture
            .layout
            .iter()
            .all(|s| (MIN_RUN..=MAX_RUN).contains(&s.length)));
    }

    #[test]
    fn clamped_run_never_drops_below_one() {
        // 0.99 always asks for the longest run.
        let mut rng = SequenceRandom::constant(0.99);
        assert_eq!(draw_run(&mut rng, 1), 1);
        assert_eq!(draw_run(&mut rng, 3), 3);
        assert_eq!(draw_run(&mut rng, 9), MAX_RUN);
    }

    #[test]
    fn longest_runs_leave_a_short_tail() {
        let config = BrickTextureConfig {
            walls: 1,
            rows: 1,
            row_width: 6,
            ..small_config()
        };
        let texture =
            BrickTextureGenerator::new(config).generate(&mut SequenceRandom::constant(0.99));
        let lengths: Vec<u32> = texture.layout.row(0, 0).iter().map(|s| s.length).collect();
        assert_eq!(lengths, vec![4, 2]);
    }

    #[test]
    fn row_offsets_are_binary() {
        let offsets = RowOffsets::generate(64, &mut StdRng::seed_from_u64(5));
        assert_eq!(offsets.len(), 64);
        assert!(offsets.values().iter().all(|&v| v <= 1));
        assert_eq!(RowOffsets::from_values([0, 3, 1]).values(), &[0, 1, 1]);
    }

    #[test]
    fn same_seed_same_texture() {
        let generator = BrickTextureGenerator::new(small_config());
        let a = generator.generate(&mut StdRng::seed_from_u64(42));
        let b = generator.generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a.layout, b.layout);
        assert_eq!(a.offsets, b.offsets);
        assert_eq!(a.image.pixels, b.image.pixels);
    }

    #[test]
    fn image_dimensions_leave_room_for_stagger() {
        let cfg = small_config();
        let texture =
            BrickTextureGenerator::new(cfg.clone()).generate(&mut StdRng::seed_from_u64(1));
        assert_eq!(texture.image.width, cfg.row_width * cfg.texel_unit + cfg.texel_unit / 2);
        assert_eq!(texture.image.height, cfg.walls * cfg.rows * cfg.texel_unit);
    }

    #[test]
    fn bricks_painted_inside_seams() {
        let cfg = small_config();
        let texture =
            BrickTextureGenerator::new(cfg.clone()).generate(&mut StdRng::seed_from_u64(9));
        let seam = Pixel::from_color(cfg.seam_color);

        for segment in texture.layout.iter() {
            let (x, y, w, h) = texture.texel_rect(segment);
            let centre = texture.image.get_pixel(x + w / 2, y + h / 2);
            assert_ne!(centre, seam);
            // One brick, one colour.
            assert_eq!(texture.image.get_pixel(x + 1, y + 1), centre);
            assert_eq!(texture.image.get_pixel(x + w - 2, y + h - 2), centre);
            // Outer ring is seam.
            assert_eq!(texture.image.get_pixel(x, y), seam);
            assert_eq!(texture.image.get_pixel(x + w - 1, y + h - 1), seam);
        }
    }

    #[test]
    fn staggered_rows_shift_by_half_a_unit() {
        let cfg = small_config();
        let texture =
            BrickTextureGenerator::new(cfg.clone()).generate(&mut StdRng::seed_from_u64(3));
        for segment in texture.layout.iter().filter(|s| s.start == 0) {
            let (x, _, _, _) = texture.texel_rect(segment);
            let expected = u32::from(texture.offsets.get(segment.row)) * cfg.texel_unit / 2;
            assert_eq!(x, expected);
        }
    }

    #[test]
    fn uv_rect_matches_texels() {
        let texture = BrickTextureGenerator::default().generate(&mut StdRng::seed_from_u64(2));
        let segment = texture.layout.row(1, 3)[0];
        let (x, y, w, h) = texture.texel_rect(&segment);
        let [u, v, du, dv] = texture.uv_rect(&segment);
        let tw = texture.image.width as f32;
        let th = texture.image.height as f32;
        assert!((u * tw - x as f32).abs() < 1e-3);
        assert!((v * th - y as f32).abs() < 1e-3);
        assert!((du * tw - w as f32).abs() < 1e-3);
        assert!((dv * th - h as f32).abs() < 1e-3);
    }
}
