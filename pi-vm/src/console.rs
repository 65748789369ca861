//! An in-memory console: interpreter plus memory-backed screen and
//! mixer, with the full builtin surface registered. This is the facade
//! the shell embeds and the integration tests drive.

use pi_cart::Cartridge;
use std::path::Path;

use crate::audio::QueueMixer;
use crate::error::InterpreterError;
use crate::host;
use crate::interpreter::{HaltHandle, Interpreter, ProgramState};
use crate::parser::{compile, ParseMode};
use crate::screen::MemoryScreen;
use crate::value::Value;

/// A ready-to-run console with in-memory devices.
pub struct MemoryConsole {
    vm: Interpreter<MemoryScreen, QueueMixer>,
}

impl Default for MemoryConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConsole {
    /// A console with every builtin and host constant registered.
    pub fn new() -> Self {
        let mut vm = Interpreter::new(MemoryScreen::new(), QueueMixer::new());
        host::register_all(&mut vm);
        MemoryConsole { vm }
    }

    /// The interpreter itself, for embedders that need more control.
    pub fn vm(&mut self) -> &mut Interpreter<MemoryScreen, QueueMixer> {
        &mut self.vm
    }

    /// The screen device.
    pub fn screen(&mut self) -> &mut MemoryScreen {
        self.vm.screen()
    }

    /// The mixer device.
    pub fn mixer(&mut self) -> &mut QueueMixer {
        self.vm.mixer()
    }

    /// Cancellation handle for another thread.
    pub fn halt_handle(&self) -> HaltHandle {
        self.vm.halt_handle()
    }

    /// Compile and run a whole program.
    pub fn run_source(&mut self, source: &str) -> Result<ProgramState, InterpreterError> {
        let chunk = compile(source, self.vm.heap_mut(), ParseMode::Program)?;
        Ok(self.vm.run(chunk)?)
    }

    /// Compile and run interactively: the value of the final
    /// expression statement comes back.
    pub fn eval(&mut self, source: &str) -> Result<Value, InterpreterError> {
        let chunk = compile(source, self.vm.heap_mut(), ParseMode::Repl)?;
        match self.vm.run(chunk)? {
            ProgramState::Completed(value) => Ok(value),
            ProgramState::Cancelled => Ok(Value::Nil),
        }
    }

    /// Shorthand: evaluate and render the result.
    pub fn eval_to_string(&mut self, source: &str) -> Result<String, InterpreterError> {
        let value = self.eval(source)?;
        Ok(self.vm.heap().display(value))
    }

    /// Boot a cartridge: adopt its sprite sheet and SFX bank, then
    /// feed the code blob through the compile pipeline and run it.
    pub fn run_cartridge(&mut self, cart: &Cartridge) -> Result<ProgramState, InterpreterError> {
        self.vm.adopt_cartridge(cart);
        let source = cart.source().into_owned();
        self.run_source(&source)
    }

    /// Boot a cartridge file from disk.
    pub fn run_cartridge_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<ProgramState, InterpreterError> {
        let cart = Cartridge::load(path)?;
        self.run_cartridge(&cart)
    }
}
