//! Tree-walking evaluator.
//!
//! [`Machine`] owns the environment built from a parsed program and walks
//! the AST directly: statements through [`Machine::execute`], expressions
//! through [`Machine::evaluate`]. Assignable things (variables, struct
//! members, array elements) are resolved to [`Location`] handles by
//! [`Machine::resolve`]; reading through a reference value transparently
//! dereferences to the pointee.
//!
//! The machine is moved onto the execution thread by the driver, runs
//! [`Machine::run`] until the shared cancellation flag is set, and is moved
//! back when the thread is joined. Cancellation is observed at every loop
//! boundary and inside every timing intrinsic.

use crate::config::Config;
use crate::hardware::HardwareBus;
use crate::interpreter::builtins;
use crate::interpreter::errors::Diagnostic;
use crate::memory::env::Env;
use crate::memory::value::{Location, PathSeg, Value};
use crate::parser::ast::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on reference-chain hops; a longer chain reads as void.
const MAX_REF_HOPS: usize = 16;

/// The script execution machine: environment, hardware bus handle,
/// cancellation flag, and collected diagnostics.
pub struct Machine {
    env: Env,
    bus: Arc<HardwareBus>,
    cancel: Arc<AtomicBool>,
    config: Config,
    diagnostics: Vec<Diagnostic>,
}

impl Machine {
    /// Build a fresh environment from a parsed program: definition tables
    /// and enum constants are installed, then global declarations execute
    /// in source order (which is why types must be declared before use).
    pub fn boot(program: &Program, bus: Arc<HardwareBus>, config: Config) -> Self {
        let mut machine = Machine {
            env: Env::new(),
            bus,
            cancel: Arc::new(AtomicBool::new(false)),
            config,
            diagnostics: Vec::new(),
        };

        for item in &program.items {
            match item {
                Item::Struct(def) => {
                    machine.env.structs.insert(def.name.clone(), def.clone());
                }
                Item::Enum(def) => {
                    for (name, value) in &def.members {
                        machine.env.globals.declare(name, Value::Int(*value));
                    }
                    machine.env.enums.insert(def.name.clone(), def.clone());
                }
                Item::Function(def) => {
                    machine
                        .env
                        .functions
                        .insert(def.name.clone(), Arc::new(def.clone()));
                }
                Item::Global(decl) => machine.execute(decl),
            }
        }

        machine
    }

    /// Replace the cancellation flag; the driver installs a fresh one per
    /// run.
    pub fn set_cancel(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = cancel;
    }

    /// Background-task body: `setup` once (if defined), then `loop`
    /// forever with a yield between iterations, until cancelled.
    pub fn run(&mut self) {
        tracing::debug!(functions = self.env.functions.len(), "execution task started");
        if self.env.functions.contains_key("setup") {
            self.call("setup", &[]);
        }
        let has_loop = self.env.functions.contains_key("loop");
        while !self.cancelled() {
            if has_loop {
                self.call("loop", &[]);
            }
            self.breathe();
        }
        tracing::debug!("execution task stopped");
    }

    /// Current value of a global, by name.
    pub fn global_value(&self, name: &str) -> Option<Value> {
        let slot = self.env.globals.lookup(name)?;
        self.env.globals.get(slot).cloned()
    }

    /// Write a host-supplied value into an already-declared global,
    /// coerced to the slot's variant. Unknown names are a no-op.
    pub fn set_global(&mut self, name: &str, value: f64) -> bool {
        match self.env.globals.lookup(name) {
            Some(slot) => {
                if let Some(v) = self.env.globals.get_mut(slot) {
                    v.store(Value::Float(value));
                }
                true
            }
            None => false,
        }
    }

    /// Diagnostics collected while executing, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // --- Statement execution ---

    /// Execute one statement. Returns immediately once the run is
    /// cancelled or the current frame's return flag is set, at every
    /// nesting level.
    pub fn execute(&mut self, stmt: &Stmt) {
        if self.halted() {
            return;
        }

        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    if self.halted() {
                        break;
                    }
                    self.execute(s);
                }
            }

            Stmt::VarDecl { name, ty, size, init } => {
                let value = match size {
                    Some(size_expr) => {
                        let requested = self.evaluate(size_expr).as_i64();
                        let len = requested.clamp(0, self.config.max_array_len as i64) as usize;
                        let element = self.env.default_value(ty);
                        Value::Array(vec![element; len])
                    }
                    None => {
                        let mut value = self.env.default_value(ty);
                        if let Some(init) = init {
                            let incoming = self.evaluate(init);
                            value.store(incoming);
                        }
                        value
                    }
                };
                self.env.declare(name, value);
            }

            Stmt::If { cond, then_branch, else_branch } => {
                if self.evaluate(cond).truthy() {
                    self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch);
                }
            }

            Stmt::While { cond, body } => {
                while !self.halted() && self.evaluate(cond).truthy() {
                    self.execute(body);
                    self.breathe();
                }
            }

            Stmt::DoWhile { body, cond } => loop {
                self.execute(body);
                self.breathe();
                if self.halted() || !self.evaluate(cond).truthy() {
                    break;
                }
            },

            Stmt::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.execute(init);
                }
                loop {
                    if self.halted() {
                        break;
                    }
                    if let Some(cond) = cond {
                        if !self.evaluate(cond).truthy() {
                            break;
                        }
                    }
                    self.execute(body);
                    if self.halted() {
                        break;
                    }
                    if let Some(step) = step {
                        self.evaluate(step);
                    }
                    self.breathe();
                }
            }

            Stmt::Return(value) => {
                let returns_ref = self.env.top().is_some_and(|f| f.returns_ref);
                let captured = match value {
                    None => Value::Void,
                    // Reference-returning functions capture the resolved
                    // location so the caller aliases it.
                    Some(expr) if returns_ref => match self.resolve(expr) {
                        Some(loc) => Value::Ref(loc),
                        None => Value::Void,
                    },
                    Some(expr) => self.evaluate(expr),
                };
                if let Some(frame) = self.env.top_mut() {
                    frame.return_value = captured;
                    frame.return_hit = true;
                }
            }

            Stmt::Expr(expr) => {
                self.evaluate(expr);
            }
        }
    }

    // --- Expression evaluation ---

    /// Evaluate an expression to a value (by copy for pure reads).
    pub fn evaluate(&mut self, expr: &Expr) -> Value {
        if self.cancelled() {
            return Value::Void;
        }

        match expr {
            Expr::Literal(lit) => match lit {
                // Literals lex as floating point; integral ones
                // materialize as integers.
                Literal::Number(n) if n.fract() == 0.0 => Value::Int(*n as i64),
                Literal::Number(n) => Value::Float(*n),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Void => Value::Void,
            },

            Expr::Variable(name) => match self.env.variable(name) {
                Some(loc) => self.read(&loc),
                None => {
                    self.diag(Diagnostic::UndeclaredVariable { name: name.clone() });
                    Value::Void
                }
            },

            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),

            Expr::Unary { op, operand } => match op {
                UnOp::Not => Value::Bool(!self.evaluate(operand).truthy()),
                UnOp::Neg => match self.evaluate(operand) {
                    Value::Int(n) => Value::Int(n.wrapping_neg()),
                    v => Value::Float(-v.as_f64()),
                },
                UnOp::PreInc => self.step_location(operand, 1, true),
                UnOp::PreDec => self.step_location(operand, -1, true),
                UnOp::Ref => match self.resolve(operand) {
                    Some(loc) => Value::Ref(loc),
                    None => {
                        self.diag(Diagnostic::NotAddressable);
                        Value::Void
                    }
                },
            },

            Expr::Postfix { op, operand } => {
                let delta = match op {
                    PostOp::Inc => 1,
                    PostOp::Dec => -1,
                };
                self.step_location(operand, delta, false)
            }

            Expr::Call { name, args } => {
                let value = self.call(name, args);
                self.deref(value)
            }

            Expr::Member { .. } | Expr::Index { .. } => match self.resolve(expr) {
                Some(loc) => self.read(&loc),
                None => Value::Void,
            },

            Expr::Assign { target, value } => {
                let incoming = self.evaluate(value);
                match self.resolve(target) {
                    Some(loc) => {
                        self.write(&loc, incoming);
                        // The result of an assignment is the coerced value
                        // actually stored, so chains propagate it.
                        self.read(&loc)
                    }
                    None => {
                        self.diag(Diagnostic::NotAddressable);
                        incoming
                    }
                }
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Value {
        // Logical connectives short-circuit.
        match op {
            BinOp::And => {
                if !self.evaluate(lhs).truthy() {
                    return Value::Bool(false);
                }
                return Value::Bool(self.evaluate(rhs).truthy());
            }
            BinOp::Or => {
                if self.evaluate(lhs).truthy() {
                    return Value::Bool(true);
                }
                return Value::Bool(self.evaluate(rhs).truthy());
            }
            _ => {}
        }

        let l = self.evaluate(lhs);
        let r = self.evaluate(rhs);
        let integral = l.is_integral() && r.is_integral();

        match op {
            BinOp::Add if integral => Value::Int(l.as_i64().wrapping_add(r.as_i64())),
            BinOp::Sub if integral => Value::Int(l.as_i64().wrapping_sub(r.as_i64())),
            BinOp::Mul if integral => Value::Int(l.as_i64().wrapping_mul(r.as_i64())),
            BinOp::Add => Value::Float(l.as_f64() + r.as_f64()),
            BinOp::Sub => Value::Float(l.as_f64() - r.as_f64()),
            BinOp::Mul => Value::Float(l.as_f64() * r.as_f64()),

            // Division always computes in floating point; a zero divisor
            // yields 0 rather than trapping.
            BinOp::Div => {
                let divisor = r.as_f64();
                if divisor == 0.0 {
                    Value::Float(0.0)
                } else {
                    Value::Float(l.as_f64() / divisor)
                }
            }

            // Modulo truncates both operands to integers.
            BinOp::Mod => {
                let divisor = r.as_i64();
                if divisor == 0 {
                    Value::Int(0)
                } else {
                    Value::Int(l.as_i64().wrapping_rem(divisor))
                }
            }

            BinOp::Lt => Value::Bool(l.as_f64() < r.as_f64()),
            BinOp::Gt => Value::Bool(l.as_f64() > r.as_f64()),

            // Handled by the short-circuit arm above.
            BinOp::And | BinOp::Or => Value::Void,
        }
    }

    /// In-place increment/decrement, preserving the slot's numeric
    /// variant. Returns the value before (postfix) or after (prefix) the
    /// mutation; non-numeric targets are untouched.
    fn step_location(&mut self, operand: &Expr, delta: i64, prefix: bool) -> Value {
        let Some(loc) = self.resolve(operand) else {
            self.diag(Diagnostic::NotAddressable);
            return Value::Void;
        };
        let before = match self.env.locate(&loc) {
            Some(v) => v.clone(),
            None => return Value::Void,
        };
        let after = match &before {
            Value::Int(n) => Value::Int(n.wrapping_add(delta)),
            Value::Float(x) => Value::Float(x + delta as f64),
            _ => return Value::Void,
        };
        self.write(&loc, after.clone());
        if prefix { after } else { before }
    }

    // --- Addressable locations ---

    /// Resolve an expression to an addressable storage location. Used by
    /// assignment, increment/decrement, and reference binding; returns
    /// `None` for expressions that have no storage.
    pub fn resolve(&mut self, expr: &Expr) -> Option<Location> {
        match expr {
            Expr::Variable(name) => {
                let loc = self.env.variable(name)?;
                Some(self.chase(loc))
            }
            Expr::Member { object, member } => {
                let loc = self.resolve(object)?;
                Some(loc.child(PathSeg::Member(member.clone())))
            }
            Expr::Index { array, index } => {
                let index = self.evaluate(index).as_i64();
                let loc = self.resolve(array)?;
                if index < 0 {
                    return None;
                }
                Some(loc.child(PathSeg::Index(index as usize)))
            }
            // `&x` names the same location as `x`.
            Expr::Unary { op: UnOp::Ref, operand } => self.resolve(operand),
            // A reference-returning call resolves to the location its
            // return value aliases.
            Expr::Call { name, args } => match self.call(name, args) {
                Value::Ref(loc) => Some(loc),
                _ => None,
            },
            _ => None,
        }
    }

    /// Follow a stored reference chain so the handle denotes the final
    /// pointee.
    fn chase(&self, mut loc: Location) -> Location {
        for _ in 0..MAX_REF_HOPS {
            match self.env.locate(&loc) {
                Some(Value::Ref(inner)) => loc = inner.clone(),
                _ => break,
            }
        }
        loc
    }

    /// Read a location's current value, transparently dereferencing any
    /// reference stored there. A vanished location reads as void.
    fn read(&mut self, loc: &Location) -> Value {
        match self.env.locate(loc) {
            Some(v) => {
                let v = v.clone();
                self.deref(v)
            }
            None => Value::Void,
        }
    }

    /// Transparently dereference a reference value.
    fn deref(&mut self, mut value: Value) -> Value {
        let mut hops = 0;
        while let Value::Ref(loc) = value {
            if hops >= MAX_REF_HOPS {
                return Value::Void;
            }
            value = self.env.locate(&loc).cloned().unwrap_or_default();
            hops += 1;
        }
        value
    }

    /// Write into a location, coercing to the slot's variant. A vanished
    /// location (popped frame, out-of-bounds index) makes this a no-op.
    fn write(&mut self, loc: &Location, value: Value) {
        if let Some(slot) = self.env.locate_mut(loc) {
            slot.store(value);
        }
    }

    // --- Calls ---

    /// Call a function by name: built-in intrinsics first, user-defined
    /// functions second. Unknown names yield void.
    pub fn call(&mut self, name: &str, args: &[Expr]) -> Value {
        if let Some(value) = builtins::dispatch(self, name, args) {
            return value;
        }

        let Some(def) = self.env.functions.get(name).cloned() else {
            self.diag(Diagnostic::UnknownFunction { name: name.to_string() });
            return Value::Void;
        };

        if self.env.depth() >= self.config.max_call_depth {
            self.diag(Diagnostic::CallDepthExceeded { name: name.to_string() });
            return Value::Void;
        }

        // Bind positionally in the caller's scope: reference parameters
        // alias the resolved location, value parameters copy (coerced to
        // the declared type). Missing arguments default.
        let mut bindings = Vec::with_capacity(def.params.len());
        for (i, param) in def.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(arg) if param.by_ref => match self.resolve(arg) {
                    Some(loc) => Value::Ref(loc),
                    None => {
                        self.diag(Diagnostic::NotAddressable);
                        self.evaluate(arg)
                    }
                },
                Some(arg) => {
                    let mut slot = self.env.default_value(&param.ty);
                    let incoming = self.evaluate(arg);
                    slot.store(incoming);
                    slot
                }
                None => self.env.default_value(&param.ty),
            };
            bindings.push((param.name.clone(), value));
        }

        self.env.push_frame(&def.name, def.returns_ref);
        for (name, value) in bindings {
            self.env.declare(&name, value);
        }

        self.execute(&def.body);

        match self.env.pop_frame() {
            Some(frame) => frame.return_value,
            None => Value::Void,
        }
    }

    // --- Scheduling ---

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Whether the current frame must not execute further statements.
    fn halted(&self) -> bool {
        self.cancelled() || self.env.top().is_some_and(|f| f.return_hit)
    }

    /// Loop-boundary pause: apply host-injected globals, then sleep
    /// briefly so the task stays cancellable without busy-spinning.
    fn breathe(&mut self) {
        for (name, value) in self.bus.drain_injected() {
            self.set_global(&name, value);
        }
        if !self.cancelled() {
            thread::sleep(self.config.loop_yield);
        }
    }

    /// Sleep for `total`, waking early when cancellation is requested.
    /// Together with [`Machine::breathe`], one of the two guaranteed
    /// cancellation points.
    pub(crate) fn suspend(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(self.config.delay_slice));
        }
    }

    // --- Support for the intrinsic catalogue ---

    pub(crate) fn bus(&self) -> &HardwareBus {
        &self.bus
    }

    pub(crate) fn turn_hold(&self) -> Duration {
        self.config.turn_hold
    }

    /// Evaluate the argument at `index` as an integer; missing arguments
    /// read 0.
    pub(crate) fn arg_i64(&mut self, args: &[Expr], index: usize) -> i64 {
        match args.get(index) {
            Some(arg) => self.evaluate(arg).as_i64(),
            None => 0,
        }
    }

    /// Evaluate every argument for its side effects.
    pub(crate) fn eval_args(&mut self, args: &[Expr]) {
        for arg in args {
            self.evaluate(arg);
        }
    }

    /// Run `op` against the stack slot the target argument resolves to.
    /// The target must be a reference to stack-typed storage (a copy of a
    /// stack is never operated on); anything else is ignored.
    pub(crate) fn stack_op(&mut self, target: Option<&Expr>, op: impl FnOnce(&mut Vec<i64>)) {
        let Some(loc) = target.and_then(|t| self.resolve(t)) else {
            self.diag(Diagnostic::NotAStack);
            return;
        };
        match self.env.locate_mut(&loc) {
            Some(Value::Pile(items)) => op(items),
            _ => self.diag(Diagnostic::NotAStack),
        }
    }

    pub(crate) fn diag(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() < self.config.max_diagnostics {
            tracing::debug!(%diagnostic, "runtime diagnostic");
            self.diagnostics.push(diagnostic);
        }
    }
}
