use image::{Rgb, RgbImage};

pub const DEFAULT_DECAY: f32 = 0.95;

/// Exponentially decaying density grid, one cell per frame pixel.
///
/// The grid is sized lazily from the first sampled frame of a session and
/// keeps those dimensions for the rest of the session.
#[derive(Debug, Clone)]
pub struct HeatmapAccumulator {
    width: u32,
    height: u32,
    cells: Vec<f32>,
    decay: f32,
}

impl HeatmapAccumulator {
    pub fn new(decay: f32) -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
            decay,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Allocates a zeroed grid on first use; later calls are no-ops even if
    /// the frame size changes.
    pub fn ensure_initialized(&mut self, width: u32, height: u32) {
        if self.is_initialized() || width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.cells = vec![0.0; width as usize * height as usize];
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Adds one hit at the given center. Coordinates outside the grid are
    /// clamped to the nearest edge cell.
    pub fn record(&mut self, cx: i32, cy: i32) {
        if !self.is_initialized() {
            return;
        }
        let x = cx.clamp(0, self.width as i32 - 1) as usize;
        let y = cy.clamp(0, self.height as i32 - 1) as usize;
        self.cells[y * self.width as usize + x] += 1.0;
    }

    /// Multiplies every cell by the decay factor. Runs once per sampled frame,
    /// including frames without detections.
    pub fn decay(&mut self) {
        let factor = self.decay;
        self.cells.iter_mut().for_each(|cell| *cell *= factor);
    }

    pub fn value(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    /// Renders the grid through a jet color ramp normalized by the current
    /// maximum. Returns `None` while the grid is empty or all zero.
    pub fn render(&self) -> Option<RgbImage> {
        let max = self.max();
        if !self.is_initialized() || max <= 0.0 {
            return None;
        }
        let mut out = RgbImage::new(self.width, self.height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let cell = self.cells[y as usize * self.width as usize + x as usize];
            *pixel = jet(cell / max);
        }
        Some(out)
    }
}

impl Default for HeatmapAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_DECAY)
    }
}

fn jet(value: f32) -> Rgb<u8> {
    let v = value.clamp(0.0, 1.0);
    let channel = |offset: f32| -> u8 {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}
