// AST definitions for robot-control scripts.

/// Declared type of a variable, parameter, or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Long,
    Bool,
    Void,
    /// The LIFO integer stack primitive (`stack s;`).
    Stack,
    /// A previously declared struct or enum name.
    User(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    And,
    Or,
}

/// Prefix unary operators. `Ref` appears at call sites (`push(&s, 1)`) and
/// resolves to an addressable location rather than a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    PreInc,
    PreDec,
    Ref,
}

/// Postfix increment/decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOp {
    Inc,
    Dec,
}

/// Literal payloads. Numbers lex as floating point; integral values
/// materialize as integer Values at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Bool(bool),
    /// Produced when the parser had to synthesize an expression while
    /// recovering; evaluates to the default Value.
    Void,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostOp,
        operand: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Expr(Expr),
    /// Scalar declaration with optional initializer, or array declaration
    /// with a size expression (evaluated once at declaration).
    VarDecl {
        name: String,
        ty: TypeName,
        size: Option<Expr>,
        init: Option<Expr>,
    },
}

/// Function parameter: declared type plus value/reference binding mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeName,
    pub by_ref: bool,
}

/// Function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: TypeName,
    /// `int &pick()`: the captured return value aliases the resolved
    /// location instead of copying it.
    pub returns_ref: bool,
    pub params: Vec<Param>,
    pub body: Stmt,
}

/// Struct definition: ordered member list.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<(String, TypeName)>,
}

/// Enum definition. Member values auto-increment from the previous member
/// (starting at 0) unless explicitly assigned; each member is also
/// installed as a global integer constant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

/// Top-level declarations, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Struct(StructDef),
    Enum(EnumDef),
    Function(FunctionDef),
    /// A global variable declaration (always a [`Stmt::VarDecl`]).
    Global(Stmt),
}

/// A parsed program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}
