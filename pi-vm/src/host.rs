//! Host-call registration: wires the builtin surface and the host
//! constants into a fresh interpreter's global table.

use crate::audio::Mixer;
use crate::builtin;
use crate::consts::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::interpreter::Interpreter;
use crate::screen::{Screen, COLOR_NAMES};
use crate::value::Value;

/// Register every shipped builtin function and constant. Embedders
/// with a custom surface can skip this and call
/// [`Interpreter::register_native`] themselves.
pub fn register_all<S: Screen, M: Mixer>(vm: &mut Interpreter<S, M>) {
    register_constants(vm);
    register_functions(vm);
}

fn register_constants<S: Screen, M: Mixer>(vm: &mut Interpreter<S, M>) {
    vm.register_const("PI", Value::Num(std::f64::consts::PI));
    vm.register_const("E", Value::Num(std::f64::consts::E));
    vm.register_const("WIDTH", Value::Num(SCREEN_WIDTH as f64));
    vm.register_const("HEIGHT", Value::Num(SCREEN_HEIGHT as f64));

    vm.register_const("WAVE_SINE", Value::Num(0.0));
    vm.register_const("WAVE_SQUARE", Value::Num(1.0));
    vm.register_const("WAVE_TRIANGLE", Value::Num(2.0));
    vm.register_const("WAVE_SAWTOOTH", Value::Num(3.0));
    vm.register_const("WAVE_NOISE", Value::Num(4.0));

    for (index, name) in COLOR_NAMES.iter().enumerate() {
        vm.register_const(name, Value::Num(index as f64));
    }
}

fn register_functions<S: Screen, M: Mixer>(vm: &mut Interpreter<S, M>) {
    // Math.
    vm.register_native("floor", builtin::math::floor);
    vm.register_native("ceil", builtin::math::ceil);
    vm.register_native("round", builtin::math::round);
    vm.register_native("abs", builtin::math::abs);
    vm.register_native("sqrt", builtin::math::sqrt);
    vm.register_native("exp", builtin::math::exp);
    vm.register_native("pow", builtin::math::pow);
    vm.register_native("log2", builtin::math::log2);
    vm.register_native("log10", builtin::math::log10);
    vm.register_native("logE", builtin::math::log_e);
    vm.register_native("sin", builtin::math::sin);
    vm.register_native("cos", builtin::math::cos);
    vm.register_native("tan", builtin::math::tan);
    vm.register_native("asin", builtin::math::asin);
    vm.register_native("acos", builtin::math::acos);
    vm.register_native("atan", builtin::math::atan);
    vm.register_native("deg", builtin::math::deg);
    vm.register_native("rad", builtin::math::rad);
    vm.register_native("min", builtin::math::min);
    vm.register_native("max", builtin::math::max);
    vm.register_native("sum", builtin::math::sum);
    vm.register_native("mean", builtin::math::mean);
    vm.register_native("rand", builtin::math::rand);
    vm.register_native("rand_n", builtin::math::rand_n);
    vm.register_native("seed", builtin::math::seed);

    // Collections.
    vm.register_native("len", builtin::col::len);
    vm.register_native("push", builtin::col::push);
    vm.register_native("pop", builtin::col::pop);
    vm.register_native("peek", builtin::col::peek);
    vm.register_native("empty", builtin::col::empty);
    vm.register_native("insert", builtin::col::insert);
    vm.register_native("remove", builtin::col::remove);
    vm.register_native("unshift", builtin::col::unshift);
    vm.register_native("append", builtin::col::append);
    vm.register_native("contains", builtin::col::contains);
    vm.register_native("index_of", builtin::col::index_of);
    vm.register_native("reverse", builtin::col::reverse);
    vm.register_native("sort", builtin::col::sort);
    vm.register_native("copy", builtin::col::copy);
    vm.register_native("slice", builtin::col::slice);
    vm.register_native("range", builtin::col::range);
    vm.register_native("keys", builtin::col::keys);
    vm.register_native("values", builtin::col::values);
    vm.register_native("clone", builtin::col::clone);
    vm.register_native("map", builtin::col::map);
    vm.register_native("filter", builtin::col::filter);
    vm.register_native("reduce", builtin::col::reduce);
    vm.register_native("find", builtin::col::find);

    // Strings.
    vm.register_native("char", builtin::string::char_of);
    vm.register_native("ord", builtin::string::ord);
    vm.register_native("trim", builtin::string::trim);
    vm.register_native("upper", builtin::string::upper);
    vm.register_native("lower", builtin::string::lower);
    vm.register_native("replace", builtin::string::replace);
    vm.register_native("split", builtin::string::split);
    vm.register_native("is_digit", builtin::string::is_digit);
    vm.register_native("is_alpha", builtin::string::is_alpha);
    vm.register_native("is_numeric", builtin::string::is_numeric);

    // I/O.
    vm.register_native("print", builtin::io::print);
    vm.register_native("println", builtin::io::println);
    vm.register_native("log", builtin::io::log);
    vm.register_native("input", builtin::io::input);
    vm.register_native("open", builtin::io::open);
    vm.register_native("read", builtin::io::read);
    vm.register_native("write", builtin::io::write);
    vm.register_native("seek", builtin::io::seek);
    vm.register_native("close", builtin::io::close);

    // Graphics.
    vm.register_native("pixel", builtin::gfx::pixel);
    vm.register_native("line", builtin::gfx::line);
    vm.register_native("rect", builtin::gfx::rect);
    vm.register_native("circ", builtin::gfx::circ);
    vm.register_native("poly", builtin::gfx::poly);
    vm.register_native("clear", builtin::gfx::clear);
    vm.register_native("color", builtin::gfx::color);
    vm.register_native("cursor", builtin::gfx::cursor);
    vm.register_native("sprite", builtin::gfx::sprite);
    vm.register_native("present", builtin::gfx::present);

    // Audio.
    vm.register_native("tone", builtin::audio::tone);
    vm.register_native("play", builtin::audio::play);
    vm.register_native("stop", builtin::audio::stop);
    vm.register_native("is_playing", builtin::audio::is_playing);

    // System.
    vm.register_native("sleep", builtin::sys::sleep);
    vm.register_native("time", builtin::sys::time);

    // Types.
    vm.register_native("type", builtin::types::type_of);
    vm.register_native("is_num", builtin::types::is_num);
    vm.register_native("is_str", builtin::types::is_str);
    vm.register_native("is_bool", builtin::types::is_bool);
    vm.register_native("is_list", builtin::types::is_list);
    vm.register_native("is_map", builtin::types::is_map);
    vm.register_native("is_fun", builtin::types::is_fun);
    vm.register_native("is_nil", builtin::types::is_nil);
    vm.register_native("is_range", builtin::types::is_range);
    vm.register_native("as_num", builtin::types::as_num);
    vm.register_native("as_str", builtin::types::as_str);
    vm.register_native("as_bool", builtin::types::as_bool);
}
