//! Execution driver.
//!
//! The host-facing [`Interpreter`]: a two-state machine (Idle, Running)
//! over the parse → boot → run pipeline. The environment lives in a
//! [`Machine`] that is moved onto the execution thread by [`start`] and
//! moved back when [`stop`] joins it, so the call stack and binding tables
//! are only ever touched from one thread at a time. The hardware bus is
//! the sole state shared while running.
//!
//! [`start`]: Interpreter::start
//! [`stop`]: Interpreter::stop

use crate::config::Config;
use crate::hardware::HardwareBus;
use crate::interpreter::engine::Machine;
use crate::interpreter::errors::Diagnostic;
use crate::memory::value::Value;
use crate::parser;
use crate::parser::ast::Program;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Machine>,
}

/// One embedded interpreter instance: owns the parsed program, the
/// hardware bus, and (between runs) the execution machine.
pub struct Interpreter {
    config: Config,
    bus: Arc<HardwareBus>,
    program: Program,
    idle: Option<Machine>,
    worker: Option<Worker>,
    load_diagnostics: Vec<Diagnostic>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            bus: Arc::new(HardwareBus::new()),
            program: Program::default(),
            idle: None,
            worker: None,
            load_diagnostics: Vec::new(),
        }
    }

    /// Stop any active run, then parse `source` into a fresh environment:
    /// all tables are rebuilt, the hardware bus is cleared, and global
    /// initializers execute. Never fails; whatever the parser could not
    /// understand lands in [`Interpreter::diagnostics`].
    pub fn load(&mut self, source: &str) {
        self.stop();
        let (program, diagnostics) = parser::parse(source);
        tracing::info!(
            items = program.items.len(),
            diagnostics = diagnostics.len(),
            "program loaded"
        );
        self.bus.reset();
        self.idle = Some(Machine::boot(&program, Arc::clone(&self.bus), self.config.clone()));
        self.program = program;
        self.load_diagnostics = diagnostics;
    }

    /// Spawn the background execution task: `setup` once, then `loop`
    /// forever until [`Interpreter::stop`]. A no-op while already running.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        let mut machine = self.idle.take().unwrap_or_else(|| {
            Machine::boot(&self.program, Arc::clone(&self.bus), self.config.clone())
        });
        let cancel = Arc::new(AtomicBool::new(false));
        machine.set_cancel(Arc::clone(&cancel));

        let spawned = thread::Builder::new()
            .name("script-exec".into())
            .spawn(move || {
                machine.run();
                machine
            });

        match spawned {
            Ok(handle) => {
                tracing::info!("execution task started");
                self.worker = Some(Worker { cancel, handle });
            }
            Err(error) => {
                // The machine moved into the failed spawn is gone; the
                // next start re-boots from the retained program.
                tracing::error!(%error, "failed to spawn execution task");
            }
        }
    }

    /// Set the cancellation flag and block until the execution task has
    /// fully exited. Safe to call at any time, including mid-`delay`; a
    /// no-op while idle. The environment is recovered from the joined
    /// task, so a later [`Interpreter::start`] resumes the same globals.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.store(true, Ordering::Release);
        match worker.handle.join() {
            Ok(machine) => {
                tracing::info!("execution task stopped");
                self.idle = Some(machine);
            }
            Err(_) => tracing::error!("execution task panicked"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Inject a sensor distance (centimeters) on an echo channel.
    pub fn set_sensor_value(&self, channel: i64, distance: f64) {
        self.bus.set_sensor(channel, distance);
    }

    pub fn get_pin_value(&self, pin: i64) -> i64 {
        self.bus.pin(pin)
    }

    pub fn set_pin_value(&self, pin: i64, value: i64) {
        self.bus.write_pin(pin, value);
    }

    /// Write into an already-declared global; a no-op for unknown names.
    /// While running the write is queued on the bus and applied at the
    /// execution task's next loop-boundary yield.
    pub fn set_variable(&mut self, name: &str, value: f64) {
        if self.worker.is_some() {
            self.bus.inject_global(name, value);
        } else if let Some(machine) = self.idle.as_mut() {
            machine.set_global(name, value);
        }
    }

    /// Read a global's current value. Only available while Idle; the
    /// environment is exclusively owned by the execution task during a
    /// run.
    pub fn global_value(&self, name: &str) -> Option<Value> {
        self.idle.as_ref().and_then(|m| m.global_value(name))
    }

    /// Diagnostics from the last [`Interpreter::load`].
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.load_diagnostics
    }

    /// Diagnostics collected by the evaluator, available while Idle.
    pub fn runtime_diagnostics(&self) -> &[Diagnostic] {
        self.idle.as_ref().map_or(&[], |m| m.diagnostics())
    }

    /// The shared hardware bus, for hosts that drive the simulation
    /// directly.
    pub fn bus(&self) -> Arc<HardwareBus> {
        Arc::clone(&self.bus)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.stop();
    }
}
