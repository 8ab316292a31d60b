//! Globals, definition tables, and the call stack.
//!
//! All of this state is exclusively owned by the execution task; the host
//! never touches it while a run is active. Variable storage is
//! slot-addressed (see the module docs of [`crate::memory`]) so that
//! [`Location`] handles survive any growth of the binding tables.

use super::value::{Base, Location, PathSeg, Value};
use crate::parser::ast::{EnumDef, FunctionDef, StructDef, TypeName};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// An append-only arena of named value slots. Redeclaring a name reuses
/// its slot, so slot indices handed out earlier stay valid.
#[derive(Debug, Default)]
pub struct Slots {
    values: Vec<Value>,
    index: FxHashMap<String, usize>,
}

impl Slots {
    pub fn declare(&mut self, name: &str, value: Value) -> usize {
        if let Some(&slot) = self.index.get(name) {
            self.values[slot] = value;
            slot
        } else {
            let slot = self.values.len();
            self.values.push(value);
            self.index.insert(name.to_string(), slot);
            slot
        }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Value> {
        self.values.get_mut(slot)
    }
}

/// A function activation record.
#[derive(Debug)]
pub struct Frame {
    pub id: u64,
    pub function: String,
    pub locals: Slots,
    /// Once set, every remaining statement in this frame is skipped until
    /// the frame unwinds.
    pub return_hit: bool,
    pub return_value: Value,
    /// Copied from the function definition at call time; return statements
    /// capture a location instead of a value when set.
    pub returns_ref: bool,
}

/// The execution environment: globals, definition tables, and the call
/// stack. Constructed fresh on every load.
#[derive(Debug, Default)]
pub struct Env {
    pub globals: Slots,
    pub structs: FxHashMap<String, StructDef>,
    pub enums: FxHashMap<String, EnumDef>,
    pub functions: FxHashMap<String, Arc<FunctionDef>>,
    frames: Vec<Frame>,
    next_frame_id: u64,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, function: &str, returns_ref: bool) -> u64 {
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        self.frames.push(Frame {
            id,
            function: function.to_string(),
            locals: Slots::default(),
            return_hit: false,
            return_value: Value::Void,
            returns_ref,
        });
        id
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    fn frame(&self, id: u64) -> Option<&Frame> {
        self.frames.iter().rev().find(|f| f.id == id)
    }

    fn frame_mut(&mut self, id: u64) -> Option<&mut Frame> {
        self.frames.iter_mut().rev().find(|f| f.id == id)
    }

    /// Location of a named variable: the current frame's locals first,
    /// then globals. Callers' locals are not visible.
    pub fn variable(&self, name: &str) -> Option<Location> {
        if let Some(frame) = self.frames.last() {
            if let Some(slot) = frame.locals.lookup(name) {
                return Some(Location::new(Base::Local { frame: frame.id, slot }));
            }
        }
        self.globals
            .lookup(name)
            .map(|slot| Location::new(Base::Global(slot)))
    }

    /// Declare a binding in the current scope (top frame if any, else
    /// globals) and return its location.
    pub fn declare(&mut self, name: &str, value: Value) -> Location {
        if let Some(frame) = self.frames.last_mut() {
            let slot = frame.locals.declare(name, value);
            Location::new(Base::Local { frame: frame.id, slot })
        } else {
            Location::new(Base::Global(self.globals.declare(name, value)))
        }
    }

    /// Resolve a handle to the storage it denotes. Returns `None` when the
    /// owning frame has been popped or the path no longer exists (for
    /// example, an out-of-bounds index); callers treat that as a default
    /// read or a no-op write.
    pub fn locate(&self, loc: &Location) -> Option<&Value> {
        let mut value = match loc.base {
            Base::Global(slot) => self.globals.get(slot)?,
            Base::Local { frame, slot } => self.frame(frame)?.locals.get(slot)?,
        };
        for seg in &loc.path {
            value = match (seg, value) {
                (PathSeg::Member(name), Value::Struct { fields, .. }) => fields.get(name)?,
                (PathSeg::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Mutable variant of [`Env::locate`].
    pub fn locate_mut(&mut self, loc: &Location) -> Option<&mut Value> {
        let mut value = match loc.base {
            Base::Global(slot) => self.globals.get_mut(slot)?,
            Base::Local { frame, slot } => self.frame_mut(frame)?.locals.get_mut(slot)?,
        };
        for seg in &loc.path {
            value = match (seg, value) {
                (PathSeg::Member(name), Value::Struct { fields, .. }) => fields.get_mut(name)?,
                (PathSeg::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Default value for a declared type. Struct defaults are built
    /// recursively from the member list; enum-typed variables are plain
    /// integers; an unknown name defaults to void.
    pub fn default_value(&self, ty: &TypeName) -> Value {
        match ty {
            TypeName::Int | TypeName::Long => Value::Int(0),
            TypeName::Float => Value::Float(0.0),
            TypeName::Bool => Value::Bool(false),
            TypeName::Void => Value::Void,
            TypeName::Stack => Value::Pile(Vec::new()),
            TypeName::User(name) => {
                if let Some(def) = self.structs.get(name) {
                    let mut fields = FxHashMap::default();
                    for (member, member_ty) in &def.fields {
                        fields.insert(member.clone(), self.default_value(member_ty));
                    }
                    Value::Struct { name: name.clone(), fields }
                } else if self.enums.contains_key(name) {
                    Value::Int(0)
                } else {
                    Value::Void
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_identity_survives_growth() {
        let mut env = Env::new();
        let loc = env.declare("first", Value::Int(1));
        // Force the arena and index to grow well past any small-capacity
        // threshold.
        for i in 0..256i64 {
            env.declare(&format!("var{i}"), Value::Int(i));
        }
        assert_eq!(env.locate(&loc), Some(&Value::Int(1)));
    }

    #[test]
    fn test_popped_frame_resolves_to_nothing() {
        let mut env = Env::new();
        env.push_frame("f", false);
        let loc = env.declare("local", Value::Int(7));
        assert_eq!(env.locate(&loc), Some(&Value::Int(7)));
        env.pop_frame();
        assert_eq!(env.locate(&loc), None);

        // A new frame reusing the same depth must not alias the old slot.
        env.push_frame("g", false);
        env.declare("other", Value::Int(99));
        assert_eq!(env.locate(&loc), None);
    }

    #[test]
    fn test_member_and_index_paths() {
        let mut env = Env::new();
        let mut fields = FxHashMap::default();
        fields.insert("items".to_string(), Value::Array(vec![Value::Int(0); 3]));
        let base = env.declare("s", Value::Struct { name: "S".to_string(), fields });

        let loc = base
            .child(PathSeg::Member("items".to_string()))
            .child(PathSeg::Index(2));
        if let Some(slot) = env.locate_mut(&loc) {
            slot.store(Value::Int(42));
        }
        assert_eq!(env.locate(&loc), Some(&Value::Int(42)));

        let oob = env
            .variable("s")
            .expect("declared")
            .child(PathSeg::Member("items".to_string()))
            .child(PathSeg::Index(9));
        assert_eq!(env.locate(&oob), None);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut env = Env::new();
        env.declare("x", Value::Int(1));
        env.push_frame("f", false);
        env.declare("x", Value::Int(2));
        let loc = env.variable("x").expect("x");
        assert_eq!(env.locate(&loc), Some(&Value::Int(2)));
        env.pop_frame();
        let loc = env.variable("x").expect("x");
        assert_eq!(env.locate(&loc), Some(&Value::Int(1)));
    }

    #[test]
    fn test_struct_defaults_recursive() {
        let mut env = Env::new();
        env.structs.insert(
            "Inner".to_string(),
            StructDef {
                name: "Inner".to_string(),
                fields: vec![("v".to_string(), TypeName::Float)],
            },
        );
        env.structs.insert(
            "Outer".to_string(),
            StructDef {
                name: "Outer".to_string(),
                fields: vec![
                    ("inner".to_string(), TypeName::User("Inner".to_string())),
                    ("count".to_string(), TypeName::Int),
                ],
            },
        );
        let Value::Struct { fields, .. } = env.default_value(&TypeName::User("Outer".to_string()))
        else {
            panic!("expected struct default");
        };
        assert_eq!(fields["count"], Value::Int(0));
        let Value::Struct { fields: inner, .. } = &fields["inner"] else {
            panic!("expected nested struct");
        };
        assert_eq!(inner["v"], Value::Float(0.0));
    }
}
