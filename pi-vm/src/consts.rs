//! Limits and fixed parameters of the virtual console.

/// Operand stack capacity, in values.
pub const STACK_MAX: usize = 1024;

/// Iterator stack capacity.
pub const ITER_MAX: usize = 256;

/// Call stack capacity, in frames.
pub const FRAMES_MAX: usize = 256;

/// Instructions executed between safe-point checks (cancellation, GC).
pub const RUN_BUNDLE: usize = 1024;

/// Allocations before the first garbage collection; the threshold
/// doubles after every cycle.
pub const GC_INITIAL_THRESHOLD: usize = 1024;

/// Framebuffer width in pixels.
pub const SCREEN_WIDTH: usize = 128;

/// Framebuffer height in pixels.
pub const SCREEN_HEIGHT: usize = 128;

/// Colors in the fixed palette.
pub const PALETTE_SIZE: usize = 32;

/// Pending tones the mixer queue accepts before dropping requests.
pub const MIXER_QUEUE_MAX: usize = 32;

/// Absolute tolerance used by numeric equality.
pub const NUM_EPSILON: f64 = 1e-9;

/// Glyph cell size of the built-in font.
pub const CHAR_WIDTH: usize = 4;
/// Glyph cell height of the built-in font.
pub const CHAR_HEIGHT: usize = 6;
