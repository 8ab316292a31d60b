//! Recursive descent parser for robot-control scripts.
//!
//! Single pass over the token stream with arbitrary fixed-offset lookahead.
//! The parser never fails: malformed constructs are skipped, a diagnostic
//! is recorded, and parsing resumes at the next recognizable point. Struct
//! and enum names are registered as the pass encounters them, so a leading
//! identifier is treated as a type name only if it was declared earlier;
//! forward references across globals are a documented grammar constraint.

use crate::interpreter::errors::Diagnostic;
use crate::parser::ast::*;
use crate::parser::lexer::{Lexer, Token, TokenKind};
use rustc_hash::FxHashSet;

/// Parse `source` into a [`Program`] plus every diagnostic the lexer and
/// parser recovered from.
pub fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    (program, parser.diagnostics)
}

/// Recursive descent parser.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    structs: FxHashSet<String>,
    enums: FxHashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize();
        Self {
            tokens,
            position: 0,
            structs: FxHashSet::default(),
            enums: FxHashSet::default(),
            diagnostics: lexer.take_diagnostics(),
        }
    }

    /// Parse the entire program (top-level declarations).
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.is_at_end() {
            let before = self.position;
            self.parse_item(&mut program);
            if self.position == before {
                // Whatever this token is, no declaration starts with it.
                self.skipped("top-level declaration");
                self.advance();
            }
        }

        program
    }

    fn parse_item(&mut self, program: &mut Program) {
        match self.kind_at(0) {
            TokenKind::Struct => {
                if let Some(def) = self.parse_struct_def() {
                    self.structs.insert(def.name.clone());
                    program.items.push(Item::Struct(def));
                }
            }
            TokenKind::Enum => {
                if let Some(def) = self.parse_enum_def() {
                    self.enums.insert(def.name.clone());
                    program.items.push(Item::Enum(def));
                }
            }
            TokenKind::Const => {
                // `const` qualifies a global declaration; constness itself
                // is not enforced.
                self.advance();
                if self.type_starts_at(0) {
                    if let Some(decl) = self.parse_var_decl() {
                        program.items.push(Item::Global(decl));
                    }
                } else {
                    self.skipped("declaration after 'const'");
                }
            }
            _ if self.type_starts_at(0) => {
                // `type name (` opens a function; `type & name (` a
                // reference-returning one; anything else is a global.
                let name_at = if self.kind_at(1) == TokenKind::Amp { 2 } else { 1 };
                if self.kind_at(name_at) == TokenKind::Ident
                    && self.kind_at(name_at + 1) == TokenKind::LParen
                {
                    if let Some(def) = self.parse_function_def() {
                        program.items.push(Item::Function(def));
                    }
                } else if let Some(decl) = self.parse_var_decl() {
                    program.items.push(Item::Global(decl));
                }
            }
            _ => {}
        }
    }

    /// Parse `struct Name { type member; ... };`
    fn parse_struct_def(&mut self) -> Option<StructDef> {
        self.advance(); // 'struct'
        let name = self.expect_ident("struct name")?;
        self.expect(TokenKind::LBrace, "'{' after struct name");

        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if self.type_starts_at(0) {
                let ty = self.parse_type();
                if let Some(field) = self.expect_ident("struct member name") {
                    self.expect(TokenKind::Semicolon, "';' after struct member");
                    fields.push((field, ty));
                    continue;
                }
            }
            self.skipped("struct member");
            self.advance();
        }

        self.expect(TokenKind::RBrace, "'}' after struct members");
        self.match_kind(TokenKind::Semicolon);

        Some(StructDef { name, fields })
    }

    /// Parse `enum Name { A, B = 5, C };`. Unassigned members increment
    /// from the previous value, starting at 0.
    fn parse_enum_def(&mut self) -> Option<EnumDef> {
        self.advance(); // 'enum'
        let name = self.expect_ident("enum name")?;
        self.expect(TokenKind::LBrace, "'{' after enum name");

        let mut members = Vec::new();
        let mut next_value: i64 = 0;
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let Some(member) = self.expect_ident("enumerator name") else {
                self.advance();
                continue;
            };
            if self.match_kind(TokenKind::Assign) {
                if let Some(value) = self.parse_enum_value() {
                    next_value = value;
                }
            }
            members.push((member, next_value));
            next_value += 1;
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RBrace, "'}' after enumerators");
        self.match_kind(TokenKind::Semicolon);

        Some(EnumDef { name, members })
    }

    /// Explicit enumerator value: an integer literal, optionally negated.
    fn parse_enum_value(&mut self) -> Option<i64> {
        let negative = self.match_kind(TokenKind::Minus);
        if self.check(TokenKind::Number) {
            let value = self.advance().number as i64;
            Some(if negative { -value } else { value })
        } else {
            self.expected("integer enumerator value");
            None
        }
    }

    /// Parse `type [&] name(params) { body }`.
    fn parse_function_def(&mut self) -> Option<FunctionDef> {
        let return_type = self.parse_type();
        let returns_ref = self.match_kind(TokenKind::Amp);
        let name = self.expect_ident("function name")?;

        self.expect(TokenKind::LParen, "'(' after function name");
        let params = self.parse_parameter_list();
        self.expect(TokenKind::RParen, "')' after parameters");

        let body = if self.check(TokenKind::LBrace) {
            self.parse_block()
        } else {
            self.expected("'{' before function body");
            Stmt::Block(Vec::new())
        };

        Some(FunctionDef { name, return_type, returns_ref, params, body })
    }

    fn parse_parameter_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();

        if self.check(TokenKind::RParen) {
            return params;
        }
        // C-style `(void)` means no parameters.
        if self.check(TokenKind::Void) && self.kind_at(1) == TokenKind::RParen {
            self.advance();
            return params;
        }

        loop {
            if !self.type_starts_at(0) {
                self.expected("parameter type");
                self.recover_to_close_paren();
                break;
            }
            let ty = self.parse_type();
            let by_ref = self.match_kind(TokenKind::Amp);
            let Some(name) = self.expect_ident("parameter name") else {
                self.recover_to_close_paren();
                break;
            };
            params.push(Param { name, ty, by_ref });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        params
    }

    /// Skip forward to the parameter list's closing parenthesis.
    fn recover_to_close_paren(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.kind_at(0) {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::LBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> Stmt {
        match self.kind_at(0) {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression())
                };
                self.expect(TokenKind::Semicolon, "';' after return");
                Stmt::Return(value)
            }
            TokenKind::Const => {
                self.advance();
                if self.type_starts_at(0) {
                    self.parse_var_decl().unwrap_or(Stmt::Block(Vec::new()))
                } else {
                    self.skipped("declaration after 'const'");
                    Stmt::Block(Vec::new())
                }
            }
            TokenKind::Semicolon => {
                self.advance();
                Stmt::Block(Vec::new())
            }
            _ if self.type_starts_at(0) => {
                self.parse_var_decl().unwrap_or(Stmt::Block(Vec::new()))
            }
            _ if self.starts_expression() => {
                let expr = self.parse_expression();
                self.expect(TokenKind::Semicolon, "';' after expression");
                Stmt::Expr(expr)
            }
            _ => {
                self.skipped("statement");
                self.advance();
                Stmt::Block(Vec::new())
            }
        }
    }

    fn parse_block(&mut self) -> Stmt {
        self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let before = self.position;
            stmts.push(self.parse_statement());
            if self.position == before {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace, "'}'");
        Stmt::Block(stmts)
    }

    fn parse_if(&mut self) -> Stmt {
        self.advance(); // 'if'
        self.expect(TokenKind::LParen, "'(' after 'if'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        let then_branch = Box::new(self.parse_statement());
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()))
        } else {
            None
        };
        Stmt::If { cond, then_branch, else_branch }
    }

    fn parse_while(&mut self) -> Stmt {
        self.advance(); // 'while'
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        let body = Box::new(self.parse_statement());
        Stmt::While { cond, body }
    }

    fn parse_do_while(&mut self) -> Stmt {
        self.advance(); // 'do'
        let body = Box::new(self.parse_statement());
        self.expect(TokenKind::While, "'while' after do body");
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        self.expect(TokenKind::Semicolon, "';' after do-while");
        Stmt::DoWhile { body, cond }
    }

    /// `for (init; cond; step) body`. The init is a typed declaration or
    /// an expression statement; condition and step are each optional. All
    /// three parse once, here; the evaluator re-evaluates the parsed nodes.
    fn parse_for(&mut self) -> Stmt {
        self.advance(); // 'for'
        self.expect(TokenKind::LParen, "'(' after 'for'");

        let init = if self.match_kind(TokenKind::Semicolon) {
            None
        } else if self.type_starts_at(0) || self.check(TokenKind::Const) {
            self.match_kind(TokenKind::Const);
            self.parse_var_decl().map(Box::new)
        } else {
            let expr = self.parse_expression();
            self.expect(TokenKind::Semicolon, "';' after for-init");
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::Semicolon, "';' after for-condition");

        let step = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::RParen, "')' after for-increment");

        let body = Box::new(self.parse_statement());
        Stmt::For { init, cond, step, body }
    }

    /// Declaration statement: `type name;`, `type name = expr;`, or
    /// `type name[size];`. Consumes the trailing semicolon.
    fn parse_var_decl(&mut self) -> Option<Stmt> {
        let ty = self.parse_type();
        let Some(name) = self.expect_ident("variable name") else {
            // Skip the unusable remainder of this declaration.
            while !self.check(TokenKind::Semicolon) && !self.is_at_end() {
                self.advance();
            }
            self.match_kind(TokenKind::Semicolon);
            return None;
        };

        let mut size = None;
        let mut init = None;
        if self.match_kind(TokenKind::LBracket) {
            size = Some(self.parse_expression());
            self.expect(TokenKind::RBracket, "']' after array size");
        } else if self.match_kind(TokenKind::Assign) {
            init = Some(self.parse_expression());
        }
        self.expect(TokenKind::Semicolon, "';' after declaration");

        Some(Stmt::VarDecl { name, ty, size, init })
    }

    // --- Expressions, precedence low → high ---

    /// Assignment, right-associative.
    fn parse_expression(&mut self) -> Expr {
        let lhs = self.parse_logical_or();
        if self.match_kind(TokenKind::Assign) {
            let value = self.parse_expression();
            Expr::Assign { target: Box::new(lhs), value: Box::new(value) }
        } else {
            lhs
        }
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut lhs = self.parse_logical_and();
        while self.match_kind(TokenKind::OrOr) {
            let rhs = self.parse_logical_and();
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        while self.match_kind(TokenKind::AndAnd) {
            let rhs = self.parse_relational();
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.kind_at(0) {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.kind_at(0) {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.kind_at(0) {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.kind_at(0) {
            TokenKind::Bang => UnOp::Not,
            TokenKind::Minus => UnOp::Neg,
            TokenKind::PlusPlus => UnOp::PreInc,
            TokenKind::MinusMinus => UnOp::PreDec,
            TokenKind::Amp => UnOp::Ref,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary();
        Expr::Unary { op, operand: Box::new(operand) }
    }

    /// A primary followed by a suffix chain: `.member`, `[index]`, `++`,
    /// `--`, in any order (`a.b[0]++`).
    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.kind_at(0) {
                TokenKind::Dot => {
                    self.advance();
                    let Some(member) = self.expect_ident("member name after '.'") else {
                        break;
                    };
                    expr = Expr::Member { object: Box::new(expr), member };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect(TokenKind::RBracket, "']' after index");
                    expr = Expr::Index { array: Box::new(expr), index: Box::new(index) };
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr::Postfix { op: PostOp::Inc, operand: Box::new(expr) };
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr::Postfix { op: PostOp::Dec, operand: Box::new(expr) };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        match self.kind_at(0) {
            TokenKind::Number => {
                let token = self.advance();
                Expr::Literal(Literal::Number(token.number))
            }
            TokenKind::True => {
                self.advance();
                Expr::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Expr::Literal(Literal::Bool(false))
            }
            TokenKind::Ident => {
                if self.kind_at(1) == TokenKind::LParen {
                    let name = self.advance().text;
                    self.advance(); // '('
                    let args = self.parse_arguments();
                    Expr::Call { name, args }
                } else {
                    Expr::Variable(self.advance().text)
                }
            }
            TokenKind::LParen => {
                // `(int)x` and `(Color)x` are cast-style no-op wrappers,
                // not grouping.
                if self.cast_starts_at(1) && self.kind_at(2) == TokenKind::RParen {
                    self.advance();
                    self.advance();
                    self.advance();
                    return self.parse_unary();
                }
                self.advance();
                let expr = self.parse_expression();
                self.expect(TokenKind::RParen, "')' after expression");
                expr
            }
            _ => {
                self.expected("expression");
                Expr::Literal(Literal::Void)
            }
        }
    }

    fn parse_arguments(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression());
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' after arguments");
        args
    }

    // --- Token classification helpers ---

    /// Whether the token at `offset` begins a type: a primitive keyword or
    /// an identifier previously registered as a struct/enum name.
    fn type_starts_at(&self, offset: usize) -> bool {
        match self.kind_at(offset) {
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Long
            | TokenKind::Bool
            | TokenKind::Void
            | TokenKind::Stack => true,
            TokenKind::Ident => {
                let text = &self.token_at(offset).text;
                self.structs.contains(text) || self.enums.contains(text)
            }
            _ => false,
        }
    }

    /// Cast wrappers accept primitive types and enum names only.
    fn cast_starts_at(&self, offset: usize) -> bool {
        match self.kind_at(offset) {
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Long
            | TokenKind::Bool
            | TokenKind::Stack => true,
            TokenKind::Ident => self.enums.contains(&self.token_at(offset).text),
            _ => false,
        }
    }

    /// Consume one type token. Callers must have checked `type_starts_at`.
    fn parse_type(&mut self) -> TypeName {
        let token = self.advance();
        match token.kind {
            TokenKind::Int => TypeName::Int,
            TokenKind::Float => TypeName::Float,
            TokenKind::Long => TypeName::Long,
            TokenKind::Bool => TypeName::Bool,
            TokenKind::Void => TypeName::Void,
            TokenKind::Stack => TypeName::Stack,
            _ => TypeName::User(token.text),
        }
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.kind_at(0),
            TokenKind::Ident
                | TokenKind::Number
                | TokenKind::True
                | TokenKind::False
                | TokenKind::LParen
                | TokenKind::Bang
                | TokenKind::Minus
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::Amp
        )
    }

    // --- Cursor helpers ---

    fn token_at(&self, offset: usize) -> &Token {
        let index = self.position + offset;
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last())
            .unwrap_or(&FALLBACK_EOF)
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        self.token_at(offset).kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind_at(0) == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.token_at(0).clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or record a diagnostic and leave the cursor alone.
    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> bool {
        if self.match_kind(kind) {
            true
        } else {
            self.expected(expected);
            false
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Option<String> {
        if self.check(TokenKind::Ident) {
            Some(self.advance().text)
        } else {
            self.expected(expected);
            None
        }
    }

    fn expected(&mut self, expected: &'static str) {
        let line = self.token_at(0).line;
        self.diagnostics.push(Diagnostic::Expected { expected, line });
    }

    fn skipped(&mut self, what: &'static str) {
        let line = self.token_at(0).line;
        self.diagnostics.push(Diagnostic::Skipped { what, line });
    }

    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }
}

static FALLBACK_EOF: Token =
    Token { kind: TokenKind::Eof, text: String::new(), number: 0.0, line: 0 };

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_clean(source: &str) -> Program {
        let (program, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        program
    }

    #[test]
    fn test_program_items() {
        let program = parse_clean(
            "struct Pose { int x; int y; };\n\
             enum Mode { IDLE, SEEK };\n\
             int speed = 200;\n\
             void setup() { }\n",
        );
        assert_eq!(program.items.len(), 4);
        assert!(matches!(program.items[0], Item::Struct(_)));
        assert!(matches!(program.items[1], Item::Enum(_)));
        assert!(matches!(program.items[2], Item::Global(_)));
        assert!(matches!(program.items[3], Item::Function(_)));
    }

    #[test]
    fn test_enum_auto_increment() {
        let program = parse_clean("enum Mode { IDLE, SEEK = 5, TURN, DONE };");
        let Item::Enum(def) = &program.items[0] else {
            panic!("expected enum");
        };
        let values: Vec<i64> = def.members.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 5, 6, 7]);
    }

    #[test]
    fn test_precedence() {
        let program = parse_clean("int x = 1 + 2 * 3;");
        let Item::Global(Stmt::VarDecl { init: Some(init), .. }) = &program.items[0] else {
            panic!("expected global with initializer");
        };
        // Multiplication binds tighter: 1 + (2 * 3).
        let Expr::Binary { op: BinOp::Add, rhs, .. } = init else {
            panic!("expected addition at the top: {init:?}");
        };
        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_suffix_chain() {
        let program = parse_clean("struct S { int a; };\nS s;\nvoid f() { s.a++; }");
        let Item::Function(def) = &program.items[2] else {
            panic!("expected function");
        };
        let Stmt::Block(body) = &def.body else { panic!() };
        let Stmt::Expr(Expr::Postfix { op: PostOp::Inc, operand }) = &body[0] else {
            panic!("expected postfix increment: {body:?}");
        };
        assert!(matches!(**operand, Expr::Member { .. }));
    }

    #[test]
    fn test_cast_is_noop_wrapper() {
        let program = parse_clean("int x = (int)3.7;");
        let Item::Global(Stmt::VarDecl { init: Some(init), .. }) = &program.items[0] else {
            panic!();
        };
        assert_eq!(*init, Expr::Literal(Literal::Number(3.7)));
    }

    #[test]
    fn test_cast_before_parenthesized_expression() {
        let program = parse_clean("int x = (float)(1 + 2);");
        let Item::Global(Stmt::VarDecl { init: Some(init), .. }) = &program.items[0] else {
            panic!();
        };
        assert!(matches!(init, Expr::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_for_with_declaration_init() {
        let program = parse_clean("void f() { for (int i = 0; i < 3; i = i + 1) { } }");
        let Item::Function(def) = &program.items[0] else { panic!() };
        let Stmt::Block(body) = &def.body else { panic!() };
        let Stmt::For { init, cond, step, .. } = &body[0] else {
            panic!("expected for: {body:?}");
        };
        assert!(matches!(init.as_deref(), Some(Stmt::VarDecl { .. })));
        assert!(cond.is_some());
        assert!(step.is_some());
    }

    #[test]
    fn test_reference_parameter_and_return() {
        let program = parse_clean("int &pick(int &x) { return x; }");
        let Item::Function(def) = &program.items[0] else { panic!() };
        assert!(def.returns_ref);
        assert!(def.params[0].by_ref);
    }

    #[test]
    fn test_assignment_right_associative() {
        let program = parse_clean("int a; int b; void f() { a = b = 1; }");
        let Item::Function(def) = &program.items[2] else { panic!() };
        let Stmt::Block(body) = &def.body else { panic!() };
        let Stmt::Expr(Expr::Assign { value, .. }) = &body[0] else { panic!() };
        assert!(matches!(**value, Expr::Assign { .. }));
    }

    #[test]
    fn test_type_must_be_declared_first() {
        // `Pose` is not yet a type when `p` is declared, so the statement
        // is skipped with diagnostics rather than failing the parse.
        let (program, diagnostics) = parse("Pose p;\nstruct Pose { int x; };");
        assert!(!diagnostics.is_empty());
        assert_eq!(program.items.len(), 1);
        assert!(matches!(program.items[0], Item::Struct(_)));
    }

    #[test]
    fn test_recovery_keeps_later_declarations() {
        let (program, diagnostics) = parse("??? @@@\nint ok = 1;");
        assert!(!diagnostics.is_empty());
        assert!(program
            .items
            .iter()
            .any(|item| matches!(item, Item::Global(Stmt::VarDecl { name, .. }) if name == "ok")));
    }

    #[test]
    fn test_stack_declaration_and_push() {
        let program = parse_clean("stack s;\nvoid f() { push(&s, 1); }");
        let Item::Function(def) = &program.items[1] else { panic!() };
        let Stmt::Block(body) = &def.body else { panic!() };
        let Stmt::Expr(Expr::Call { name, args }) = &body[0] else { panic!() };
        assert_eq!(name, "push");
        assert!(matches!(args[0], Expr::Unary { op: UnOp::Ref, .. }));
    }
}
