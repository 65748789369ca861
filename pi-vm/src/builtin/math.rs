//! Math builtins.

use pi_asm::PanicReason;
use rand::Rng;
use rand::SeedableRng;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::screen::Screen;
use crate::value::Value;

use super::{int, list_id, need, num};

macro_rules! unary_math {
    ($($(#[$doc:meta])* $name:ident => $f:expr),+ $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name<S: Screen, M: Mixer>(
                vm: &mut Interpreter<S, M>,
                args: &[Value],
            ) -> SimpleResult<Value> {
                need(args, 1, stringify!($name))?;
                let x = num(vm, args, 0)?;
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Num(f(x)))
            }
        )+
    };
}

unary_math! {
    /// Largest integer not above the argument.
    floor => f64::floor,
    /// Smallest integer not below the argument.
    ceil => f64::ceil,
    /// Round half away from zero.
    round => f64::round,
    /// Absolute value.
    abs => f64::abs,
    exp => f64::exp,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    /// Radians to degrees.
    deg => f64::to_degrees,
    /// Degrees to radians.
    rad => f64::to_radians,
}

fn domain_err(name: &str, x: f64) -> RuntimeError {
    RuntimeError::msg(
        PanicReason::DomainError,
        format!("{name} is undefined for {x}"),
    )
}

/// Square root; negative arguments fault.
pub fn sqrt<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "sqrt")?;
    let x = num(vm, args, 0)?;
    if x < 0.0 {
        return Err(domain_err("sqrt", x));
    }
    Ok(Value::Num(x.sqrt()))
}

fn checked_log<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
    name: &str,
    f: fn(f64) -> f64,
) -> SimpleResult<Value> {
    need(args, 1, name)?;
    let x = num(vm, args, 0)?;
    if x <= 0.0 {
        return Err(domain_err(name, x));
    }
    Ok(Value::Num(f(x)))
}

/// Base-2 logarithm; non-positive arguments fault.
pub fn log2<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    checked_log(vm, args, "log2", f64::log2)
}

/// Base-10 logarithm; non-positive arguments fault.
pub fn log10<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    checked_log(vm, args, "log10", f64::log10)
}

/// Natural logarithm; non-positive arguments fault.
pub fn log_e<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    checked_log(vm, args, "logE", f64::ln)
}

/// `pow(base, exponent)`.
pub fn pow<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "pow")?;
    let base = num(vm, args, 0)?;
    let exponent = num(vm, args, 1)?;
    Ok(Value::Num(base.powf(exponent)))
}

/// Numbers from a call: either one list argument or the arguments
/// themselves.
fn gather<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    name: &str,
) -> SimpleResult<Vec<f64>> {
    if args.len() == 1 {
        if let Ok(id) = list_id(vm, args, 0, name) {
            let items = match vm.heap().get(id) {
                crate::object::Object::List(l) => l.items.clone(),
                _ => Vec::new(),
            };
            return items.iter().map(|v| vm.heap().as_number(*v)).collect();
        }
    }
    args.iter().map(|v| vm.heap().as_number(*v)).collect()
}

/// Smallest of the arguments (or of a single list argument).
pub fn min<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "min")?;
    let xs = gather(vm, args, "min")?;
    Ok(Value::Num(xs.iter().copied().fold(f64::INFINITY, f64::min)))
}

/// Largest of the arguments (or of a single list argument).
pub fn max<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "max")?;
    let xs = gather(vm, args, "max")?;
    Ok(Value::Num(
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ))
}

/// Sum of the arguments (or of a single list argument).
pub fn sum<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    let xs = gather(vm, args, "sum")?;
    Ok(Value::Num(xs.iter().sum()))
}

/// Arithmetic mean of the arguments (or of a single list argument).
pub fn mean<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "mean")?;
    let xs = gather(vm, args, "mean")?;
    if xs.is_empty() {
        return Err(RuntimeError::msg(
            PanicReason::DomainError,
            "mean of an empty sequence",
        ));
    }
    Ok(Value::Num(xs.iter().sum::<f64>() / xs.len() as f64))
}

/// Uniform float in `[0, 1)`.
pub fn rand<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    Ok(Value::Num(vm.rng.gen::<f64>()))
}

/// Uniform integer in `[0, n)`.
pub fn rand_n<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "rand_n")?;
    let n = int(vm, args, 0)?;
    if n <= 0 {
        return Err(RuntimeError::msg(
            PanicReason::DomainError,
            "rand_n needs a positive bound",
        ));
    }
    Ok(Value::Num(vm.rng.gen_range(0..n) as f64))
}

/// Reseed the generator for reproducible runs.
pub fn seed<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "seed")?;
    let n = int(vm, args, 0)? as u64;
    vm.rng = rand::rngs::StdRng::seed_from_u64(n);
    Ok(Value::Nil)
}
