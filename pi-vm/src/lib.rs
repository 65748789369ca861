//! PiScript interpreter implementation.
//!
//! The pipeline flows one direction: source text → tokens → bytecode
//! plus constant pool → VM execution → side effects on the
//! [`Screen`](screen::Screen) and [`Mixer`](audio::Mixer) capabilities
//! and the filesystem. Programs arrive either as bare source or packed
//! in a `PX1` cartridge (see the `pi-cart` crate).

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod audio;
mod builtin;
pub mod console;
pub mod consts;
pub mod debug;
pub mod draw;
pub mod error;
pub mod heap;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod screen;
pub mod table;
pub mod token;
pub mod value;

pub mod prelude {
    //! The types most embedders need.
    #[doc(no_inline)]
    pub use pi_asm::{BinaryOp, CompareOp, Opcode, PanicReason, UnaryOp};
    #[doc(no_inline)]
    pub use pi_cart::{Cartridge, Note, SfxData, SpriteData, Waveform};

    pub use crate::audio::{Mixer, QueueMixer, Tone};
    pub use crate::console::MemoryConsole;
    pub use crate::error::{
        CompileError, CompileErrorKind, InterpreterError, RuntimeError, SimpleResult, Span,
    };
    pub use crate::heap::{Heap, ObjId};
    pub use crate::host::register_all;
    pub use crate::interpreter::{HaltHandle, Interpreter, NativeFn, ProgramState};
    pub use crate::object::Object;
    pub use crate::parser::{compile, Chunk, ParseMode};
    pub use crate::screen::{MemoryScreen, Screen, PALETTE};
    pub use crate::value::Value;
}
