//! Console and file I/O builtins.

use std::fs::OpenOptions;
use std::io::{BufRead, Read, Seek, SeekFrom, Write};

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::object::{FileMode, Object, PiFile};
use crate::screen::Screen;
use crate::value::Value;

use super::{arg, int, need, str_arg};

/// Print arguments separated by spaces, no newline.
pub fn print<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    let line = join_args(vm, args);
    std::io::stdout()
        .write_all(line.as_bytes())
        .map_err(|e| io_err("write to stdout", e))?;
    Ok(Value::Nil)
}

/// Print arguments separated by spaces, with a newline.
pub fn println<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    println!("{}", join_args(vm, args));
    Ok(Value::Nil)
}

/// Emit through the tracing subscriber instead of stdout.
pub fn log<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    tracing::info!(target: "piscript", "{}", join_args(vm, args));
    Ok(Value::Nil)
}

/// Read one line from stdin, without its newline.
pub fn input<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    _args: &[Value],
) -> SimpleResult<Value> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| io_err("read from stdin", e))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(vm.heap_mut().alloc_str(line))
}

fn join_args<S: Screen, M: Mixer>(vm: &Interpreter<S, M>, args: &[Value]) -> String {
    args.iter()
        .map(|v| vm.heap().display(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_err(what: &str, e: std::io::Error) -> RuntimeError {
    RuntimeError::msg(PanicReason::IoFailed, format!("could not {what}: {e}"))
}

/// `open(path, mode)` with mode `r`, `w`, or `a`.
pub fn open<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "open")?;
    let path = str_arg(vm, args, 0, "open")?;
    let mode = match str_arg(vm, args, 1, "open")?.as_str() {
        "r" => FileMode::Read,
        "w" => FileMode::Write,
        "a" => FileMode::Append,
        other => {
            return Err(RuntimeError::msg(
                PanicReason::BadFileMode,
                format!("bad file mode '{other}'"),
            ))
        }
    };

    let mut options = OpenOptions::new();
    match mode {
        FileMode::Read => options.read(true),
        FileMode::Write => options.write(true).create(true).truncate(true),
        FileMode::Append => options.append(true).create(true),
    };
    let handle = options.open(&path).map_err(|e| {
        RuntimeError::msg(
            PanicReason::OpenFailed,
            format!("could not open '{path}': {e}"),
        )
    })?;

    let id = vm.heap_mut().alloc(Object::File(PiFile {
        handle: Some(handle),
        path,
        mode,
    }));
    Ok(Value::Obj(id))
}

fn file_check<'a, S: Screen, M: Mixer>(
    vm: &'a mut Interpreter<S, M>,
    args: &[Value],
    name: &str,
) -> SimpleResult<&'a mut PiFile> {
    let value = arg(args, 0);
    let id = value
        .as_obj()
        .filter(|id| matches!(vm.heap().get(*id), Object::File(_)))
        .ok_or_else(|| {
            RuntimeError::msg(
                PanicReason::TypeMismatch,
                format!("{name} expects a file, got {}", vm.heap().type_name(value)),
            )
        })?;
    match vm.heap_mut().get_mut(id) {
        Object::File(f) => Ok(f),
        _ => Err(PanicReason::TypeMismatch.into()),
    }
}

/// Read the whole remaining contents as a string.
pub fn read<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "read")?;
    let file = file_check(vm, args, "read")?;
    let handle = file
        .handle
        .as_mut()
        .ok_or_else(|| RuntimeError::from(PanicReason::FileClosed))?;
    let mut contents = String::new();
    handle
        .read_to_string(&mut contents)
        .map_err(|e| io_err("read file", e))?;
    Ok(vm.heap_mut().alloc_str(contents))
}

/// Write the string form of every remaining argument.
pub fn write<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "write")?;
    let payload: String = args[1..]
        .iter()
        .map(|v| vm.heap().display(*v))
        .collect();
    let file = file_check(vm, args, "write")?;
    if file.mode == FileMode::Read {
        return Err(RuntimeError::msg(
            PanicReason::BadFileMode,
            "file is open for reading",
        ));
    }
    let handle = file
        .handle
        .as_mut()
        .ok_or_else(|| RuntimeError::from(PanicReason::FileClosed))?;
    handle
        .write_all(payload.as_bytes())
        .map_err(|e| io_err("write file", e))?;
    Ok(Value::Num(payload.len() as f64))
}

/// Seek to an absolute byte offset.
pub fn seek<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "seek")?;
    let offset = int(vm, args, 1)?.max(0) as u64;
    let file = file_check(vm, args, "seek")?;
    let handle = file
        .handle
        .as_mut()
        .ok_or_else(|| RuntimeError::from(PanicReason::FileClosed))?;
    let at = handle
        .seek(SeekFrom::Start(offset))
        .map_err(|e| io_err("seek file", e))?;
    Ok(Value::Num(at as f64))
}

/// Close the file; later reads and writes fault.
pub fn close<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "close")?;
    let file = file_check(vm, args, "close")?;
    file.handle = None;
    Ok(Value::Nil)
}
