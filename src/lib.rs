//! # Introduction
//!
//! botscript parses and executes a C-like robot-control dialect on a
//! background thread, concurrently with a host simulation that exchanges
//! pin and sensor values with the script through a lock-guarded
//! [`hardware::HardwareBus`].
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Machine (execution thread) ⇄ HardwareBus ⇄ host simulation
//! ```
//!
//! 1. [`parser`] — tokenises the source and builds an AST. Parsing never
//!    fails; unrecognizable input is skipped and recorded as a diagnostic.
//! 2. [`memory`] — the runtime model: tagged [`memory::value::Value`]s in
//!    slot-addressed [`memory::env::Env`] storage, so reference values stay
//!    valid however the binding tables grow.
//! 3. [`interpreter`] — the tree-walking [`interpreter::engine::Machine`]
//!    and its built-in intrinsic catalogue.
//! 4. [`hardware`] — pin and sensor stores shared with the host simulation
//!    under a single lock.
//! 5. [`driver`] — the Idle/Running state machine hosts embed
//!    ([`Interpreter`]).
//!
//! ## Supported dialect
//!
//! Types: `int`, `float`, `long`, `bool`, `void`, `stack`, structs, enums,
//! fixed-size arrays. Control flow: `if/else`, `while`, `do-while`, `for`,
//! `return`. Functions take parameters by value or by reference (`int &x`)
//! and may return references. Built-ins: `digitalWrite`, `analogWrite`,
//! `delay`, `delayMicroseconds`, `readUltrasonic`, `push`, `pop`,
//! `forward`, `backward`, `left`, `right`, `stop`, `pinMode`.
//!
//! ## Never-abort contract
//!
//! Scripts are typed live by users inside an interactive tool, so nothing a
//! script contains may crash or hang the host: stray characters, malformed
//! statements, undeclared variables, out-of-range indexing, division by
//! zero, and unbounded recursion all degrade to defaults, optionally
//! recorded as [`Diagnostic`]s for tooling display.

pub mod config;
pub mod driver;
pub mod hardware;
pub mod interpreter;
pub mod memory;
pub mod parser;

pub use config::Config;
pub use driver::Interpreter;
pub use hardware::HardwareBus;
pub use interpreter::errors::Diagnostic;
pub use memory::value::Value;
