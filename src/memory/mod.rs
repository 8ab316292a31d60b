//! The runtime memory model.
//!
//! - [`value`]: the tagged [`value::Value`] union and the [`value::Location`]
//!   handle that names a storage slot without borrowing it.
//! - [`env`]: slot-arena storage for globals and call frames, plus the
//!   struct/enum/function definition tables.
//!
//! # Slot addressing
//!
//! Every variable lives in an append-only slot arena and is addressed by
//! index (globals) or frame-id + index (locals). Struct members and array
//! elements are addressed by a path re-walked on every access. A handle
//! therefore stays valid however the owning containers grow; a handle into
//! a popped frame simply resolves to nothing and reads as the default
//! Value. This is what makes reference values safe without raw pointers.

pub mod env;
pub mod value;
