/// RGBA8 pixel buffer, row-major, origin top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Self {
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        };
        canvas.fill(background);
        canvas
    }

    /// Wrap an existing RGBA buffer of exactly `width·height·4` bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let idx = self.index(x as i64, y as i64)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(out)
    }

    /// Overwrite one pixel. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx..idx + 4].copy_from_slice(&color);
        }
    }

    /// Source-over blend using `color[3]` as coverage. The result is opaque.
    pub fn blend(&mut self, x: i64, y: i64, color: [u8; 4]) {
        let Some(idx) = self.index(x, y) else { return };
        let a = color[3] as f32 / 255.0;
        if a <= 0.0 {
            return;
        }
        let inv_a = 1.0 - a;
        for c in 0..3 {
            self.pixels[idx + c] =
                (color[c] as f32 * a + self.pixels[idx + c] as f32 * inv_a).round() as u8;
        }
        self.pixels[idx + 3] = 255;
    }

    pub fn vertical_line(&mut self, x: i64, color: [u8; 4]) {
        for y in 0..self.height as i64 {
            self.blend(x, y, color);
        }
    }

    /// Straight segment, one blended pixel per step along the major axis.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), color: [u8; 4]) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let x = (from.0 + dx * t).round() as i64;
            let y = (from.1 + dy * t).round() as i64;
            self.blend(x, y, color);
        }
    }

    pub fn fill_circle(&mut self, center: (f64, f64), radius: f64, color: [u8; 4]) {
        let r2 = radius * radius;
        let x0 = (center.0 - radius).floor() as i64;
        let x1 = (center.0 + radius).ceil() as i64;
        let y0 = (center.1 - radius).floor() as i64;
        let y1 = (center.1 + radius).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let ddx = x as f64 - center.0;
                let ddy = y as f64 - center.1;
                if ddx * ddx + ddy * ddy <= r2 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}
