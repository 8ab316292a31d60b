//! Script execution engine.
//!
//! - [`engine`]: the tree-walking [`engine::Machine`]: statement
//!   execution, expression evaluation, addressable-location resolution,
//!   call frames, and the background-task body.
//! - [`builtins`]: the fixed intrinsic catalogue, consulted before
//!   user-defined functions.
//! - [`errors`]: non-fatal [`errors::Diagnostic`]s.
//!
//! # Execution model
//!
//! The machine walks the AST directly; there is no bytecode. Every loop
//! boundary yields briefly and re-checks the cancellation flag, and timing
//! intrinsics sleep in slices, so a run can always be stopped within a
//! bounded delay no matter what the script does. Nothing a script contains
//! aborts execution: unknown names, bad indexes, and division by zero all
//! degrade to default values.

pub mod builtins;
pub mod engine;
pub mod errors;
