//! Rasterizers over the [`Screen`] capability: lines, rectangles,
//! circles, and polygons, plus sprite blitting.

use crate::object::PiSprite;
use crate::screen::Screen;

/// Bresenham line from `(x0, y0)` to `(x1, y1)`.
pub fn line(screen: &mut dyn Screen, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        screen.set_pixel(x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Axis-aligned rectangle with top-left `(x, y)`.
pub fn rect(screen: &mut dyn Screen, x: i32, y: i32, w: i32, h: i32, color: u8, filled: bool) {
    if w <= 0 || h <= 0 {
        return;
    }
    if filled {
        for row in y..y + h {
            for col in x..x + w {
                screen.set_pixel(col, row, color);
            }
        }
    } else {
        line(screen, x, y, x + w - 1, y, color);
        line(screen, x, y + h - 1, x + w - 1, y + h - 1, color);
        line(screen, x, y, x, y + h - 1, color);
        line(screen, x + w - 1, y, x + w - 1, y + h - 1, color);
    }
}

/// Midpoint circle centered at `(cx, cy)`.
pub fn circle(screen: &mut dyn Screen, cx: i32, cy: i32, radius: i32, color: u8, filled: bool) {
    if radius < 0 {
        return;
    }
    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;

    while x >= y {
        if filled {
            line(screen, cx - x, cy + y, cx + x, cy + y, color);
            line(screen, cx - x, cy - y, cx + x, cy - y, color);
            line(screen, cx - y, cy + x, cx + y, cy + x, color);
            line(screen, cx - y, cy - x, cx + y, cy - x, color);
        } else {
            for (px, py) in [
                (cx + x, cy + y),
                (cx - x, cy + y),
                (cx + x, cy - y),
                (cx - x, cy - y),
                (cx + y, cy + x),
                (cx - y, cy + x),
                (cx + y, cy - x),
                (cx - y, cy - x),
            ] {
                screen.set_pixel(px, py, color);
            }
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Closed polygon through `points`, outlined.
pub fn polygon(screen: &mut dyn Screen, points: &[(i32, i32)], color: u8) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        line(screen, pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
    }
    let first = points[0];
    let last = points[points.len() - 1];
    line(screen, last.0, last.1, first.0, first.1, color);
}

/// Blit a sprite with its top-left at `(x, y)`; palette index 0 is
/// transparent.
pub fn sprite(screen: &mut dyn Screen, sprite: &PiSprite, x: i32, y: i32) {
    for row in 0..sprite.height as i32 {
        for col in 0..sprite.width as i32 {
            let pixel = sprite.pixels[(row * sprite.width as i32 + col) as usize];
            if pixel != 0 {
                screen.set_pixel(x + col, y + row, pixel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::MemoryScreen;

    #[test]
    fn horizontal_line_covers_every_pixel() {
        let mut screen = MemoryScreen::new();
        line(&mut screen, 2, 5, 9, 5, 7);
        for x in 2..=9 {
            assert_eq!(screen.pixel(x, 5), Some(7));
        }
        assert_eq!(screen.pixel(1, 5), Some(0));
        assert_eq!(screen.pixel(10, 5), Some(0));
    }

    #[test]
    fn diagonal_line_endpoints() {
        let mut screen = MemoryScreen::new();
        line(&mut screen, 0, 0, 10, 7, 3);
        assert_eq!(screen.pixel(0, 0), Some(3));
        assert_eq!(screen.pixel(10, 7), Some(3));
    }

    #[test]
    fn filled_rect_and_outline_differ() {
        let mut screen = MemoryScreen::new();
        rect(&mut screen, 1, 1, 4, 4, 2, false);
        assert_eq!(screen.pixel(2, 2), Some(0));
        assert_eq!(screen.pixel(1, 2), Some(2));

        rect(&mut screen, 1, 1, 4, 4, 2, true);
        assert_eq!(screen.pixel(2, 2), Some(2));
    }

    #[test]
    fn sprite_zero_is_transparent() {
        let mut screen = MemoryScreen::new();
        screen.clear(9);
        let spr = PiSprite {
            width: 2,
            height: 2,
            pixels: vec![1, 0, 0, 4],
        };
        sprite(&mut screen, &spr, 10, 10);
        assert_eq!(screen.pixel(10, 10), Some(1));
        assert_eq!(screen.pixel(11, 10), Some(9));
        assert_eq!(screen.pixel(11, 11), Some(4));
    }
}
