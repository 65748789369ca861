//! Audio builtins over the mixer capability.

use pi_asm::PanicReason;
use pi_cart::Waveform;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::screen::Screen;
use crate::value::Value;

use super::{int, need, num};

fn waveform_arg<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
) -> SimpleResult<Waveform> {
    if args.len() <= i {
        return Ok(Waveform::Sine);
    }
    let code = vm.heap().as_number(args[i])? as i64;
    u8::try_from(code)
        .ok()
        .and_then(|b| Waveform::try_from(b).ok())
        .ok_or_else(|| {
            RuntimeError::msg(
                PanicReason::DomainError,
                format!("{code} is not a waveform code"),
            )
        })
}

/// `tone(frequency, duration_ms, waveform = WAVE_SINE)`.
pub fn tone<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "tone")?;
    let frequency = num(vm, args, 0)?;
    let duration = int(vm, args, 1)?.max(0) as u32;
    let waveform = waveform_arg(vm, args, 2)?;
    vm.mixer().play(frequency, duration, waveform);
    Ok(Value::Nil)
}

/// `play(sfx_index)`: queue every audible note of a cartridge sound.
/// A note lasts `speed` ticks at 60 ticks per second.
pub fn play<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "play")?;
    let index = int(vm, args, 0)?;
    let id = usize::try_from(index)
        .ok()
        .and_then(|i| vm.sounds.get(i).copied())
        .ok_or_else(|| {
            RuntimeError::msg(
                PanicReason::IndexOutOfBounds,
                format!("no sound {index} in the loaded cartridge"),
            )
        })?;

    let data = match vm.heap().get(id) {
        Object::Sound(s) => s.data.clone(),
        _ => return Err(PanicReason::TypeMismatch.into()),
    };

    let note_ms = (data.speed.max(1) as u32 * 1000) / 60;
    for note in data.notes.iter().take(data.length as usize) {
        if note.volume > 0 {
            vm.mixer()
                .play(note.frequency as f64, note_ms, note.waveform);
        }
    }
    Ok(Value::Nil)
}

/// `stop()`: flush the queue and silence playback.
pub fn stop<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    vm.mixer().stop_all();
    Ok(Value::Nil)
}

/// `is_playing()`.
pub fn is_playing<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    Ok(Value::Bool(vm.mixer().is_playing()))
}
