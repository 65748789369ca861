//! Drawing builtins over the screen capability.

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::draw;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::screen::Screen;
use crate::value::Value;

use super::{arg, int, list_id, need, num};

fn color_arg<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
) -> SimpleResult<u8> {
    Ok(vm.heap().as_number(arg(args, i))? as i64 as u8)
}

/// `pixel(x, y, color, alpha?)`.
pub fn pixel<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 3, "pixel")?;
    let x = int(vm, args, 0)? as i32;
    let y = int(vm, args, 1)? as i32;
    let color = color_arg(vm, args, 2)?;
    if args.len() > 3 {
        let alpha = num(vm, args, 3)?;
        vm.screen().set_pixel_alpha(x, y, color, alpha);
    } else {
        vm.screen().set_pixel(x, y, color);
    }
    Ok(Value::Nil)
}

/// `line(x0, y0, x1, y1, color)`.
pub fn line<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 5, "line")?;
    let x0 = int(vm, args, 0)? as i32;
    let y0 = int(vm, args, 1)? as i32;
    let x1 = int(vm, args, 2)? as i32;
    let y1 = int(vm, args, 3)? as i32;
    let color = color_arg(vm, args, 4)?;
    draw::line(vm.screen(), x0, y0, x1, y1, color);
    Ok(Value::Nil)
}

/// `rect(x, y, w, h, color, filled = false)`.
pub fn rect<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 5, "rect")?;
    let x = int(vm, args, 0)? as i32;
    let y = int(vm, args, 1)? as i32;
    let w = int(vm, args, 2)? as i32;
    let h = int(vm, args, 3)? as i32;
    let color = color_arg(vm, args, 4)?;
    let filled = vm.heap().truthy(arg(args, 5));
    draw::rect(vm.screen(), x, y, w, h, color, filled);
    Ok(Value::Nil)
}

/// `circ(cx, cy, radius, color, filled = false)`.
pub fn circ<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 4, "circ")?;
    let cx = int(vm, args, 0)? as i32;
    let cy = int(vm, args, 1)? as i32;
    let radius = int(vm, args, 2)? as i32;
    let color = color_arg(vm, args, 3)?;
    let filled = vm.heap().truthy(arg(args, 4));
    draw::circle(vm.screen(), cx, cy, radius, color, filled);
    Ok(Value::Nil)
}

/// `poly(points, color)` where points is a flat `[x0, y0, x1, y1, …]`
/// list or a list of `[x, y]` pairs.
pub fn poly<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "poly")?;
    let id = list_id(vm, args, 0, "poly")?;
    let color = color_arg(vm, args, 1)?;

    let raw = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    let mut points: Vec<(i32, i32)> = Vec::new();
    if raw.iter().all(|v| vm.heap().list_of(*v).is_some()) && !raw.is_empty() {
        for pair in &raw {
            let items = vm
                .heap()
                .list_of(*pair)
                .map(|l| l.items.clone())
                .unwrap_or_default();
            if items.len() < 2 {
                return Err(poly_err());
            }
            let x = vm.heap().as_number(items[0])? as i32;
            let y = vm.heap().as_number(items[1])? as i32;
            points.push((x, y));
        }
    } else {
        if raw.len() % 2 != 0 {
            return Err(poly_err());
        }
        for chunk in raw.chunks_exact(2) {
            let x = vm.heap().as_number(chunk[0])? as i32;
            let y = vm.heap().as_number(chunk[1])? as i32;
            points.push((x, y));
        }
    }

    draw::polygon(vm.screen(), &points, color);
    Ok(Value::Nil)
}

fn poly_err() -> RuntimeError {
    RuntimeError::msg(
        PanicReason::TypeMismatch,
        "poly expects [x, y, …] or [[x, y], …] points",
    )
}

/// `clear(color = 0)`.
pub fn clear<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    let color = if args.is_empty() {
        0
    } else {
        color_arg(vm, args, 0)?
    };
    vm.screen().clear(color);
    Ok(Value::Nil)
}

/// `color(c)`: set the text color.
pub fn color<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "color")?;
    let c = color_arg(vm, args, 0)?;
    vm.screen().set_text_color(c);
    Ok(Value::Nil)
}

/// `cursor(x, y)`: move the text cursor; returns the previous spot.
pub fn cursor<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "cursor")?;
    let x = int(vm, args, 0)? as i32;
    let y = int(vm, args, 1)? as i32;
    let (px, py) = vm.screen().cursor();
    vm.screen().set_cursor(x, y);
    let previous = vm
        .heap_mut()
        .alloc_list(vec![Value::Num(px as f64), Value::Num(py as f64)]);
    Ok(previous)
}

/// `sprite(index, x, y)`: blit a cartridge sprite; index 0 in the
/// sprite's pixels is transparent.
pub fn sprite<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 3, "sprite")?;
    let index = int(vm, args, 0)?;
    let x = int(vm, args, 1)? as i32;
    let y = int(vm, args, 2)? as i32;

    let id = usize::try_from(index)
        .ok()
        .and_then(|i| vm.sprites.get(i).copied())
        .ok_or_else(|| {
            RuntimeError::msg(
                PanicReason::IndexOutOfBounds,
                format!("no sprite {index} in the loaded cartridge"),
            )
        })?;
    let data = match vm.heap().get(id) {
        Object::Sprite(s) => s.clone(),
        _ => return Err(PanicReason::TypeMismatch.into()),
    };
    draw::sprite(vm.screen(), &data, x, y);
    Ok(Value::Nil)
}

/// `present()`: hand the frame to the display.
pub fn present<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    vm.screen().present();
    Ok(Value::Nil)
}
