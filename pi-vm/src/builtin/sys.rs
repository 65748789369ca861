//! System builtins.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::audio::Mixer;
use crate::error::SimpleResult;
use crate::interpreter::Interpreter;
use crate::screen::Screen;
use crate::value::Value;

use super::{int, need};

/// `sleep(ms)`: block the VM thread for at least that long.
pub fn sleep<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "sleep")?;
    let ms = int(vm, args, 0)?.max(0) as u64;
    std::thread::sleep(Duration::from_millis(ms));
    Ok(Value::Nil)
}

/// `time()`: seconds since the Unix epoch, fractional.
pub fn time<S: Screen, M: Mixer>(
    _vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Ok(Value::Num(now.as_secs_f64()))
}
