//! The screen capability: a 128×128 indexed-color framebuffer over a
//! fixed 32-color palette.

use crate::consts::{PALETTE_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};

/// The fixed console palette, RGB per index.
pub const PALETTE: [(u8, u8, u8); PALETTE_SIZE] = [
    (0, 0, 0),       // black
    (29, 43, 83),    // dark blue
    (126, 37, 83),   // dark magenta
    (0, 135, 81),    // dark green
    (171, 82, 54),   // brown
    (95, 87, 79),    // dark gray
    (255, 255, 255), // white
    (255, 241, 232), // very light pink
    (255, 0, 77),    // bright red
    (255, 163, 0),   // bright orange
    (255, 236, 39),  // bright yellow
    (0, 228, 54),    // bright green
    (41, 173, 255),  // bright blue
    (131, 118, 156), // soft purple
    (255, 119, 168), // bright pink
    (255, 204, 170), // peach
    (41, 24, 20),    // dark brown
    (17, 29, 53),    // navy blue
    (66, 33, 54),    // deep purple
    (18, 83, 89),    // teal
    (116, 47, 41),   // rust red
    (73, 51, 59),    // muted purple
    (162, 136, 121), // warm gray
    (243, 239, 125), // pale lime
    (190, 18, 80),   // dark pink
    (255, 108, 36),  // orange red
    (168, 231, 46),  // lime green
    (0, 181, 67),    // emerald green
    (6, 90, 181),    // cobalt blue
    (117, 70, 101),  // dusky purple
    (255, 110, 89),  // coral
    (255, 157, 129), // light salmon
];

/// Script-visible color names, in palette order.
pub const COLOR_NAMES: [&str; PALETTE_SIZE] = [
    "BLACK",
    "DARK_BLUE",
    "DARK_MAGENTA",
    "DARK_GREEN",
    "BROWN",
    "DARK_GRAY",
    "WHITE",
    "VERY_LIGHT_PINK",
    "BRIGHT_RED",
    "BRIGHT_ORANGE",
    "BRIGHT_YELLOW",
    "BRIGHT_GREEN",
    "BRIGHT_BLUE",
    "SOFT_PURPLE",
    "BRIGHT_PINK",
    "PEACH",
    "DARK_BROWN",
    "NAVY_BLUE",
    "DEEP_PURPLE",
    "TEAL",
    "RUST_RED",
    "MUTED_PURPLE",
    "WARM_GRAY",
    "PALE_LIME",
    "DARK_PINK",
    "ORANGE_RED",
    "LIME_GREEN",
    "EMERALD_GREEN",
    "COBALT_BLUE",
    "DUSKY_PURPLE",
    "CORAL",
    "LIGHT_SALMON",
];

/// Nearest palette index to an RGB triple, by squared distance.
pub fn nearest_color(r: u8, g: u8, b: u8) -> u8 {
    let mut best = 0usize;
    let mut best_dist = u32::MAX;
    for (i, (pr, pg, pb)) in PALETTE.iter().enumerate() {
        let dr = r as i32 - *pr as i32;
        let dg = g as i32 - *pg as i32;
        let db = b as i32 - *pb as i32;
        let dist = (dr * dr + dg * dg + db * db) as u32;
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best as u8
}

/// What the core exposes to host draw functions. Writes outside the
/// 128×128 surface are silently dropped.
pub trait Screen {
    /// Write one pixel.
    fn set_pixel(&mut self, x: i32, y: i32, color: u8);

    /// Blend one pixel over the existing one, `alpha` in `[0, 1]`.
    fn set_pixel_alpha(&mut self, x: i32, y: i32, color: u8, alpha: f64);

    /// Write one pixel with its RGB scaled by `brightness` in `[0, 1]`.
    fn set_pixel_shaded(&mut self, x: i32, y: i32, color: u8, brightness: f64);

    /// Read one pixel back, when it is on the surface.
    fn pixel(&self, x: i32, y: i32) -> Option<u8>;

    /// Fill the whole surface.
    fn clear(&mut self, color: u8);

    /// Hand the finished frame to the display.
    fn present(&mut self);

    /// Text cursor position.
    fn cursor(&self) -> (i32, i32);

    /// Move the text cursor.
    fn set_cursor(&mut self, x: i32, y: i32);

    /// Current text color.
    fn text_color(&self) -> u8;

    /// Change the text color.
    fn set_text_color(&mut self, color: u8);
}

/// An in-memory screen: the framebuffer the interpreter draws into,
/// with presented frames kept for the host (and the tests) to read.
#[derive(Debug, Clone)]
pub struct MemoryScreen {
    pixels: Vec<u8>,
    presented: Vec<u8>,
    frames: u64,
    cursor_x: i32,
    cursor_y: i32,
    text_color: u8,
}

impl Default for MemoryScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScreen {
    /// A cleared screen.
    pub fn new() -> Self {
        MemoryScreen {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            presented: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            frames: 0,
            cursor_x: 0,
            cursor_y: 0,
            text_color: 6,
        }
    }

    fn offset(x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= SCREEN_WIDTH as i32 || y >= SCREEN_HEIGHT as i32 {
            return None;
        }
        Some(y as usize * SCREEN_WIDTH + x as usize)
    }

    /// The working (not yet presented) framebuffer.
    pub fn framebuffer(&self) -> &[u8] {
        &self.pixels
    }

    /// The last presented frame.
    pub fn last_frame(&self) -> &[u8] {
        &self.presented
    }

    /// How many frames have been presented.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }
}

impl Screen for MemoryScreen {
    fn set_pixel(&mut self, x: i32, y: i32, color: u8) {
        if let Some(at) = Self::offset(x, y) {
            self.pixels[at] = color % PALETTE_SIZE as u8;
        }
    }

    fn set_pixel_alpha(&mut self, x: i32, y: i32, color: u8, alpha: f64) {
        let Some(at) = Self::offset(x, y) else { return };
        let alpha = alpha.clamp(0.0, 1.0);
        let (nr, ng, nb) = PALETTE[color as usize % PALETTE_SIZE];
        let (or, og, ob) = PALETTE[self.pixels[at] as usize % PALETTE_SIZE];
        let mix = |n: u8, o: u8| (n as f64 * alpha + o as f64 * (1.0 - alpha)) as u8;
        self.pixels[at] = nearest_color(mix(nr, or), mix(ng, og), mix(nb, ob));
    }

    fn set_pixel_shaded(&mut self, x: i32, y: i32, color: u8, brightness: f64) {
        let Some(at) = Self::offset(x, y) else { return };
        let brightness = brightness.clamp(0.0, 1.0);
        let (r, g, b) = PALETTE[color as usize % PALETTE_SIZE];
        let scale = |c: u8| (c as f64 * brightness) as u8;
        self.pixels[at] = nearest_color(scale(r), scale(g), scale(b));
    }

    fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        Self::offset(x, y).map(|at| self.pixels[at])
    }

    fn clear(&mut self, color: u8) {
        self.pixels.fill(color % PALETTE_SIZE as u8);
    }

    fn present(&mut self) {
        self.presented.copy_from_slice(&self.pixels);
        self.frames += 1;
    }

    fn cursor(&self) -> (i32, i32) {
        (self.cursor_x, self.cursor_y)
    }

    fn set_cursor(&mut self, x: i32, y: i32) {
        self.cursor_x = x;
        self.cursor_y = y;
    }

    fn text_color(&self) -> u8 {
        self.text_color
    }

    fn set_text_color(&mut self, color: u8) {
        self.text_color = color % PALETTE_SIZE as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut screen = MemoryScreen::new();
        screen.set_pixel(-1, 0, 5);
        screen.set_pixel(0, 128, 5);
        screen.set_pixel(128, 0, 5);
        assert!(screen.framebuffer().iter().all(|p| *p == 0));

        screen.set_pixel(127, 127, 5);
        assert_eq!(screen.pixel(127, 127), Some(5));
    }

    #[test]
    fn present_snapshots_the_framebuffer() {
        let mut screen = MemoryScreen::new();
        screen.set_pixel(3, 4, 9);
        assert_eq!(screen.last_frame()[4 * SCREEN_WIDTH + 3], 0);

        screen.present();
        assert_eq!(screen.last_frame()[4 * SCREEN_WIDTH + 3], 9);
        assert_eq!(screen.frames_presented(), 1);
    }

    #[test]
    fn alpha_blend_full_and_zero() {
        let mut screen = MemoryScreen::new();
        screen.clear(0);
        screen.set_pixel_alpha(1, 1, 6, 1.0);
        assert_eq!(screen.pixel(1, 1), Some(6));

        screen.set_pixel_alpha(1, 1, 8, 0.0);
        assert_eq!(screen.pixel(1, 1), Some(6));
    }

    #[test]
    fn shading_to_black() {
        let mut screen = MemoryScreen::new();
        screen.set_pixel_shaded(0, 0, 6, 0.0);
        assert_eq!(screen.pixel(0, 0), Some(0));
    }

    #[test]
    fn nearest_color_is_exact_on_palette_entries() {
        for (i, (r, g, b)) in PALETTE.iter().enumerate() {
            assert_eq!(nearest_color(*r, *g, *b) as usize, i);
        }
    }
}
