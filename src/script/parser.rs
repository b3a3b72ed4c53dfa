use std::rc::Rc;

use super::error::ScriptError;
use super::lexer::{FPiece, Tok, Token, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FPart {
    Text(String),
    Field {
        expr: Expr,
        conversion: Option<char>,
        spec: Option<String>,
    },
}

/// One `for target in iter [if cond]...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Pattern,
    pub iter: Expr,
    pub conditions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    FString(Vec<FPart>),
    None,
    Bool(bool),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),
    ListComp {
        element: Box<Expr>,
        clauses: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<Comprehension>,
    },
    Name(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// Only valid as the index of an `Index`.
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// A comparison chain: `a < b <= c`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Logic(Box<Expr>, BoolOp, Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
}

/// A single assignable location.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Attr(Expr, String),
    Index(Expr, Expr),
}

/// Left-hand side of an assignment or loop header, possibly unpacking.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Target(Target),
    Tuple(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportNames {
    All,
    Names(Vec<(String, Option<String>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Import {
        module: String,
        alias: Option<String>,
    },
    FromImport {
        module: String,
        names: ImportNames,
    },
    /// `a = b = value`: every pattern receives the same value.
    Assign {
        targets: Vec<Pattern>,
        value: Expr,
    },
    AugAssign {
        target: Target,
        op: BinOp,
        value: Expr,
    },
    Expr(Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        target: Pattern,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Def(Rc<FunctionDef>),
    Class {
        name: String,
        bases: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Raise(Option<Expr>),
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    Delete(Vec<Target>),
    Break,
    Continue,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

const KEYWORDS: [&str; 35] = [
    "None", "True", "False", "and", "or", "not", "in", "is", "if", "elif", "else", "for", "while",
    "def", "class", "return", "break", "continue", "pass", "import", "from", "as", "raise",
    "assert", "del", "lambda", "global", "nonlocal", "with", "try", "except", "finally", "yield",
    "async", "await",
];

const UNSUPPORTED_STATEMENTS: [&str; 9] = [
    "with", "try", "except", "finally", "yield", "global", "nonlocal", "async", "await",
];

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut program = Vec::new();
    while !parser.at(&Tok::Eof) {
        parser.statement(&mut program)?;
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Enclosing `def` bodies; `return` is only valid inside one.
    functions: usize,
    /// Enclosing loops of the innermost function.
    loops: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            functions: 0,
            loops: 0,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_tok(&self, offset: usize) -> &Tok {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn line(&self) -> usize {
        self.current().line
    }

    fn at(&self, tok: &Tok) -> bool {
        &self.current().tok == tok
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current().tok, Tok::Ident(name) if name == keyword)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.current().tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ScriptError> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{keyword}'")))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.current().tok.clone() {
            Tok::Ident(name) if !is_reserved(&name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let found = describe(&self.current().tok);
        ScriptError::syntax(self.line(), format!("expected {expected}, found {found}"))
    }

    fn end_of_statement(&mut self) -> Result<(), ScriptError> {
        if self.eat(&Tok::Newline) || self.at(&Tok::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of line"))
        }
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), ScriptError> {
        let line = self.line();
        if self.at(&Tok::Indent) {
            return Err(ScriptError::syntax(line, "unexpected indent"));
        }
        if let Tok::Ident(word) = &self.current().tok
            && UNSUPPORTED_STATEMENTS.contains(&word.as_str())
        {
            return Err(ScriptError::syntax(
                line,
                format!("'{word}' statements are not supported in snippets"),
            ));
        }
        let stmt = if self.at_keyword("if") {
            self.if_statement(line)?
        } else if self.at_keyword("while") {
            self.while_loop(line)?
        } else if self.at_keyword("for") {
            self.for_loop(line)?
        } else if self.at_keyword("def") {
            self.function_def(line)?
        } else if self.at_keyword("class") {
            self.class_def(line)?
        } else {
            return self.simple_statements(out);
        };
        out.push(stmt);
        Ok(())
    }

    /// One or more `;`-separated simple statements ending the line.
    fn simple_statements(&mut self, out: &mut Vec<Stmt>) -> Result<(), ScriptError> {
        loop {
            out.push(self.simple_statement()?);
            if !self.eat(&Tok::Semicolon) || self.at(&Tok::Newline) || self.at(&Tok::Eof) {
                break;
            }
        }
        self.end_of_statement()
    }

    fn simple_statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.line();
        let kind = if self.at_keyword("import") {
            self.advance();
            let module = self.dotted_name()?;
            let alias = if self.at_keyword("as") {
                self.advance();
                Some(self.ident("alias name")?)
            } else {
                None
            };
            StmtKind::Import { module, alias }
        } else if self.at_keyword("from") {
            self.advance();
            let module = self.dotted_name()?;
            self.expect_keyword("import")?;
            let names = self.import_names()?;
            StmtKind::FromImport { module, names }
        } else if self.at_keyword("pass") {
            self.advance();
            StmtKind::Pass
        } else if self.at_keyword("break") || self.at_keyword("continue") {
            let Tok::Ident(word) = self.advance() else {
                return Err(self.unexpected("'break' or 'continue'"));
            };
            if self.loops == 0 {
                return Err(ScriptError::syntax(line, format!("'{word}' outside loop")));
            }
            if word == "break" {
                StmtKind::Break
            } else {
                StmtKind::Continue
            }
        } else if self.at_keyword("return") {
            self.advance();
            if self.functions == 0 {
                return Err(ScriptError::syntax(line, "'return' outside function"));
            }
            if self.at_statement_end() {
                StmtKind::Return(None)
            } else {
                StmtKind::Return(Some(self.exprlist()?))
            }
        } else if self.at_keyword("raise") {
            self.advance();
            if self.at_statement_end() {
                StmtKind::Raise(None)
            } else {
                StmtKind::Raise(Some(self.test()?))
            }
        } else if self.at_keyword("assert") {
            self.advance();
            let test = self.test()?;
            let message = if self.eat(&Tok::Comma) {
                Some(self.test()?)
            } else {
                None
            };
            StmtKind::Assert { test, message }
        } else if self.at_keyword("del") {
            self.advance();
            let mut targets = Vec::new();
            loop {
                let expr = self.postfix()?;
                targets.push(
                    to_target(expr)
                        .ok_or_else(|| ScriptError::syntax(line, "cannot delete expression"))?,
                );
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            StmtKind::Delete(targets)
        } else {
            self.expression_statement(line)?
        };
        Ok(Stmt { line, kind })
    }

    fn expression_statement(&mut self, line: usize) -> Result<StmtKind, ScriptError> {
        let first = self.exprlist()?;
        if let Some(op) = augmented_op(&self.current().tok) {
            self.advance();
            let target = to_target(first).ok_or_else(|| {
                ScriptError::syntax(line, "illegal expression for augmented assignment")
            })?;
            let value = self.exprlist()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }
        if matches!(first, Expr::Name(_)) && self.eat(&Tok::Colon) {
            // Annotated assignment; the annotation is not evaluated.
            self.test()?;
            if !self.eat(&Tok::Assign) {
                return Ok(StmtKind::Pass);
            }
            let value = self.exprlist()?;
            let target = to_pattern(first, line)?;
            return Ok(StmtKind::Assign {
                targets: vec![target],
                value,
            });
        }
        if !self.at(&Tok::Assign) {
            return Ok(StmtKind::Expr(first));
        }
        let mut targets = Vec::new();
        let mut value = first;
        while self.eat(&Tok::Assign) {
            targets.push(to_pattern(value, line)?);
            value = self.exprlist()?;
        }
        Ok(StmtKind::Assign { targets, value })
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current().tok,
            Tok::Newline | Tok::Eof | Tok::Semicolon
        )
    }

    /// Parses `: NEWLINE INDENT stmts DEDENT`, or a one-line body after the
    /// colon.
    fn block(&mut self, line: usize, what: &str) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(Tok::Colon, "':'")?;
        let mut body = Vec::new();
        if !self.eat(&Tok::Newline) {
            self.simple_statements(&mut body)?;
            return Ok(body);
        }
        if !self.eat(&Tok::Indent) {
            return Err(ScriptError::syntax(
                line,
                format!("expected an indented block after '{what}'"),
            ));
        }
        while !self.eat(&Tok::Dedent) {
            if self.at(&Tok::Eof) {
                break;
            }
            self.statement(&mut body)?;
        }
        Ok(body)
    }

    fn if_statement(&mut self, line: usize) -> Result<Stmt, ScriptError> {
        self.expect_keyword("if")?;
        let cond = self.test()?;
        let body = self.block(line, "if")?;
        let mut branches = vec![(cond, body)];
        let mut orelse = Vec::new();
        loop {
            let clause_line = self.line();
            if self.at_keyword("elif") {
                self.advance();
                let cond = self.test()?;
                let body = self.block(clause_line, "elif")?;
                branches.push((cond, body));
            } else if self.at_keyword("else") {
                self.advance();
                orelse = self.block(clause_line, "else")?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    fn while_loop(&mut self, line: usize) -> Result<Stmt, ScriptError> {
        self.expect_keyword("while")?;
        let cond = self.test()?;
        self.loops += 1;
        let body = self.block(line, "while");
        self.loops -= 1;
        Ok(Stmt {
            line,
            kind: StmtKind::While { cond, body: body? },
        })
    }

    fn for_loop(&mut self, line: usize) -> Result<Stmt, ScriptError> {
        self.expect_keyword("for")?;
        let target = self.target_list()?;
        self.expect_keyword("in")?;
        let iter = self.exprlist()?;
        self.loops += 1;
        let body = self.block(line, "for");
        self.loops -= 1;
        Ok(Stmt {
            line,
            kind: StmtKind::For {
                target,
                iter,
                body: body?,
            },
        })
    }

    fn function_def(&mut self, line: usize) -> Result<Stmt, ScriptError> {
        self.expect_keyword("def")?;
        let name = self.ident("function name")?;
        self.expect(Tok::LParen, "'('")?;
        let mut params: Vec<Param> = Vec::new();
        while !self.eat(&Tok::RParen) {
            if self.at(&Tok::Star) || self.at(&Tok::DoubleStar) {
                return Err(ScriptError::syntax(
                    self.line(),
                    "variadic parameters are not supported in snippets",
                ));
            }
            let param = self.ident("parameter name")?;
            if self.eat(&Tok::Colon) {
                self.test()?;
            }
            let default = if self.eat(&Tok::Assign) {
                Some(self.test()?)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(ScriptError::syntax(
                    line,
                    "non-default argument follows default argument",
                ));
            }
            if params.iter().any(|p| p.name == param) {
                return Err(ScriptError::syntax(
                    line,
                    format!("duplicate argument '{param}' in function definition"),
                ));
            }
            params.push(Param {
                name: param,
                default,
            });
            if !self.eat(&Tok::Comma) {
                self.expect(Tok::RParen, "',' or ')'")?;
                break;
            }
        }
        if self.eat(&Tok::Arrow) {
            self.test()?;
        }

        let outer_loops = std::mem::replace(&mut self.loops, 0);
        self.functions += 1;
        let body = self.block(line, "def");
        self.functions -= 1;
        self.loops = outer_loops;
        Ok(Stmt {
            line,
            kind: StmtKind::Def(Rc::new(FunctionDef {
                name,
                params,
                body: body?,
            })),
        })
    }

    fn class_def(&mut self, line: usize) -> Result<Stmt, ScriptError> {
        self.expect_keyword("class")?;
        let name = self.ident("class name")?;
        let mut bases = Vec::new();
        if self.eat(&Tok::LParen) {
            while !self.eat(&Tok::RParen) {
                bases.push(self.test()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(Tok::RParen, "',' or ')'")?;
                    break;
                }
            }
        }
        let outer = (
            std::mem::replace(&mut self.loops, 0),
            std::mem::replace(&mut self.functions, 0),
        );
        let body = self.block(line, "class");
        (self.loops, self.functions) = outer;
        Ok(Stmt {
            line,
            kind: StmtKind::Class {
                name,
                bases,
                body: body?,
            },
        })
    }

    fn dotted_name(&mut self) -> Result<String, ScriptError> {
        let mut parts = vec![self.ident("module name")?];
        while self.eat(&Tok::Dot) {
            parts.push(self.ident("module name")?);
        }
        Ok(parts.join("."))
    }

    fn import_names(&mut self) -> Result<ImportNames, ScriptError> {
        if self.eat(&Tok::Star) {
            return Ok(ImportNames::All);
        }
        let parenthesized = self.eat(&Tok::LParen);
        let mut names = Vec::new();
        loop {
            let name = self.ident("name to import")?;
            let alias = if self.at_keyword("as") {
                self.advance();
                Some(self.ident("alias name")?)
            } else {
                None
            };
            names.push((name, alias));
            if !self.eat(&Tok::Comma) {
                break;
            }
            if parenthesized && self.at(&Tok::RParen) {
                break;
            }
        }
        if parenthesized {
            self.expect(Tok::RParen, "')'")?;
        }
        Ok(ImportNames::Names(names))
    }

    /// Loop and comprehension targets: `x`, `i, x`, `(a, b), c`.
    fn target_list(&mut self) -> Result<Pattern, ScriptError> {
        let first = self.target_atom()?;
        if !self.at(&Tok::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if self.at_keyword("in") {
                break;
            }
            items.push(self.target_atom()?);
        }
        Ok(Pattern::Tuple(items))
    }

    fn target_atom(&mut self) -> Result<Pattern, ScriptError> {
        let line = self.line();
        let close = match self.current().tok {
            Tok::LParen => Some(Tok::RParen),
            Tok::LBracket => Some(Tok::RBracket),
            _ => None,
        };
        if let Some(close) = close {
            self.advance();
            let inner = self.target_list()?;
            self.expect(close, "closing bracket")?;
            return Ok(inner);
        }
        let expr = self.postfix()?;
        to_target(expr)
            .map(Pattern::Target)
            .ok_or_else(|| ScriptError::syntax(line, "cannot assign to expression"))
    }

    /// `a, b, c` builds a tuple; a single expression stays as it is.
    fn exprlist(&mut self) -> Result<Expr, ScriptError> {
        let first = self.test()?;
        if !self.at(&Tok::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if self.at_expression_end() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expression_end(&self) -> bool {
        let tok = &self.current().tok;
        augmented_op(tok).is_some()
            || matches!(
                tok,
                Tok::Newline
                    | Tok::Eof
                    | Tok::Semicolon
                    | Tok::Assign
                    | Tok::Colon
                    | Tok::RParen
                    | Tok::RBracket
                    | Tok::RBrace
            )
    }

    fn test(&mut self) -> Result<Expr, ScriptError> {
        if self.at_keyword("lambda") {
            return Err(ScriptError::syntax(
                self.line(),
                "'lambda' expressions are not supported in snippets",
            ));
        }
        let expr = self.or_test()?;
        if !self.at_keyword("if") {
            return Ok(expr);
        }
        self.advance();
        let cond = self.or_test()?;
        self.expect_keyword("else")?;
        let orelse = self.test()?;
        Ok(Expr::IfElse {
            cond: Box::new(cond),
            then: Box::new(expr),
            orelse: Box::new(orelse),
        })
    }

    fn or_test(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.and_test()?;
        while self.at_keyword("or") {
            self.advance();
            let rhs = self.and_test()?;
            lhs = Expr::Logic(Box::new(lhs), BoolOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_test(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.not_test()?;
        while self.at_keyword("and") {
            self.advance();
            let rhs = self.not_test()?;
            lhs = Expr::Logic(Box::new(lhs), BoolOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_test(&mut self) -> Result<Expr, ScriptError> {
        if self.at_keyword("not") {
            self.advance();
            return Ok(Expr::Not(Box::new(self.not_test()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let keyword = |tok: &Tok, word: &str| matches!(tok, Tok::Ident(name) if name == word);
        let (tok, next) = (&self.current().tok, self.peek_tok(1));
        let (op, width) = match tok {
            Tok::Lt => (CmpOp::Lt, 1),
            Tok::Gt => (CmpOp::Gt, 1),
            Tok::Le => (CmpOp::Le, 1),
            Tok::Ge => (CmpOp::Ge, 1),
            Tok::EqEq => (CmpOp::Eq, 1),
            Tok::NotEq => (CmpOp::NotEq, 1),
            t if keyword(t, "in") => (CmpOp::In, 1),
            t if keyword(t, "not") && keyword(next, "in") => (CmpOp::NotIn, 2),
            t if keyword(t, "is") && keyword(next, "not") => (CmpOp::IsNot, 2),
            t if keyword(t, "is") => (CmpOp::Is, 1),
            _ => return None,
        };
        for _ in 0..width {
            self.advance();
        }
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.current().tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.current().tok {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn factor(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.factor()?)));
        }
        if self.eat(&Tok::Plus) {
            return self.factor();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ScriptError> {
        let base = self.postfix()?;
        if self.eat(&Tok::DoubleStar) {
            let exponent = self.factor()?;
            return Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Tok::LParen) {
                let (args, kwargs) = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else if self.eat(&Tok::Dot) {
                let field = self.ident("attribute name")?;
                expr = Expr::Attr(Box::new(expr), field);
            } else if self.eat(&Tok::LBracket) {
                let index = self.subscript()?;
                self.expect(Tok::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn subscript(&mut self) -> Result<Expr, ScriptError> {
        let lower = if self.at(&Tok::Colon) {
            None
        } else {
            Some(self.exprlist()?)
        };
        if !self.eat(&Tok::Colon) {
            return lower.ok_or_else(|| self.unexpected("an index"));
        }
        let upper = if self.at(&Tok::Colon) || self.at(&Tok::RBracket) {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        let step = if self.eat(&Tok::Colon) && !self.at(&Tok::RBracket) {
            Some(Box::new(self.test()?))
        } else {
            None
        };
        Ok(Expr::Slice {
            lower: lower.map(Box::new),
            upper,
            step,
        })
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ScriptError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.eat(&Tok::RParen) {
            let is_keyword =
                matches!(self.current().tok, Tok::Ident(_)) && *self.peek_tok(1) == Tok::Assign;
            if is_keyword {
                let name = self.ident("keyword argument")?;
                self.advance();
                if kwargs.iter().any(|(seen, _)| *seen == name) {
                    return Err(ScriptError::syntax(
                        self.line(),
                        format!("keyword argument repeated: {name}"),
                    ));
                }
                kwargs.push((name, self.test()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(ScriptError::syntax(
                        self.line(),
                        "positional argument follows keyword argument",
                    ));
                }
                let arg = self.test()?;
                if self.at_keyword("for") {
                    // A bare generator argument: `sum(x for x in xs)`.
                    let clauses = self.comprehension()?;
                    args.push(Expr::ListComp {
                        element: Box::new(arg),
                        clauses,
                    });
                    self.expect(Tok::RParen, "')'")?;
                    break;
                }
                args.push(arg);
            }
            if !self.eat(&Tok::Comma) {
                self.expect(Tok::RParen, "',' or ')'")?;
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn comprehension(&mut self) -> Result<Vec<Comprehension>, ScriptError> {
        let mut clauses = Vec::new();
        while self.at_keyword("for") {
            self.advance();
            let target = self.target_list()?;
            self.expect_keyword("in")?;
            let iter = self.or_test()?;
            let mut conditions = Vec::new();
            while self.at_keyword("if") {
                self.advance();
                conditions.push(self.or_test()?);
            }
            clauses.push(Comprehension {
                target,
                iter,
                conditions,
            });
        }
        Ok(clauses)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let line = self.line();
        if !matches!(
            self.current().tok,
            Tok::Number(_)
                | Tok::Str(_)
                | Tok::FStr(_)
                | Tok::Ident(_)
                | Tok::LParen
                | Tok::LBracket
                | Tok::LBrace
        ) {
            return Err(self.unexpected("an expression"));
        }
        match self.advance() {
            Tok::Number(value) => Ok(Expr::Number(value)),
            Tok::Str(value) => {
                let mut value = value;
                // Adjacent literals concatenate.
                while let Tok::Str(next) = &self.current().tok {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(value))
            }
            Tok::FStr(pieces) => format_string(pieces, line),
            Tok::Ident(name) => {
                if name == "None" {
                    Ok(Expr::None)
                } else if name == "True" || name == "False" {
                    Ok(Expr::Bool(name == "True"))
                } else if is_reserved(&name) {
                    Err(ScriptError::syntax(
                        line,
                        format!("unexpected keyword '{name}'"),
                    ))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Tok::LParen => {
                if self.eat(&Tok::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.test()?;
                if self.at_keyword("for") {
                    let clauses = self.comprehension()?;
                    self.expect(Tok::RParen, "')'")?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        clauses,
                    });
                }
                if !self.at(&Tok::Comma) {
                    self.expect(Tok::RParen, "')'")?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat(&Tok::Comma) {
                    if self.at(&Tok::RParen) {
                        break;
                    }
                    items.push(self.test()?);
                }
                self.expect(Tok::RParen, "',' or ')'")?;
                Ok(Expr::Tuple(items))
            }
            Tok::LBracket => {
                if self.eat(&Tok::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.test()?;
                if self.at_keyword("for") {
                    let clauses = self.comprehension()?;
                    self.expect(Tok::RBracket, "']'")?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        clauses,
                    });
                }
                let mut items = vec![first];
                while self.eat(&Tok::Comma) {
                    if self.at(&Tok::RBracket) {
                        break;
                    }
                    items.push(self.test()?);
                }
                self.expect(Tok::RBracket, "',' or ']'")?;
                Ok(Expr::List(items))
            }
            Tok::LBrace => self.brace_display(),
            _ => Err(ScriptError::syntax(line, "expected an expression")),
        }
    }

    /// Dict or set literal, or a dict comprehension, after the `{`.
    fn brace_display(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first = self.test()?;
        if !self.eat(&Tok::Colon) {
            if self.at_keyword("for") {
                return Err(ScriptError::syntax(
                    self.line(),
                    "set comprehensions are not supported in snippets",
                ));
            }
            let mut items = vec![first];
            while self.eat(&Tok::Comma) {
                if self.at(&Tok::RBrace) {
                    break;
                }
                items.push(self.test()?);
            }
            self.expect(Tok::RBrace, "',' or '}'")?;
            return Ok(Expr::Set(items));
        }
        let value = self.test()?;
        if self.at_keyword("for") {
            let clauses = self.comprehension()?;
            self.expect(Tok::RBrace, "'}'")?;
            return Ok(Expr::DictComp {
                key: Box::new(first),
                value: Box::new(value),
                clauses,
            });
        }
        let mut entries = vec![(first, value)];
        while self.eat(&Tok::Comma) {
            if self.at(&Tok::RBrace) {
                break;
            }
            let key = self.test()?;
            self.expect(Tok::Colon, "':'")?;
            entries.push((key, self.test()?));
        }
        self.expect(Tok::RBrace, "',' or '}'")?;
        Ok(Expr::Dict(entries))
    }
}

fn format_string(pieces: Vec<FPiece>, line: usize) -> Result<Expr, ScriptError> {
    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        parts.push(match piece {
            FPiece::Text(text) => FPart::Text(text),
            FPiece::Field {
                source,
                conversion,
                spec,
            } => {
                if let Some(c) = conversion
                    && !matches!(c, 'r' | 's' | 'a')
                {
                    return Err(ScriptError::syntax(
                        line,
                        format!("f-string: invalid conversion character '{c}'"),
                    ));
                }
                FPart::Field {
                    expr: embedded_expr(&source, line)?,
                    conversion,
                    spec,
                }
            }
        });
    }
    Ok(Expr::FString(parts))
}

/// Parses the expression inside an f-string field, reporting errors on the
/// line of the literal.
fn embedded_expr(source: &str, line: usize) -> Result<Expr, ScriptError> {
    let mut tokens = tokenize(source.trim()).map_err(|mut err| {
        err.line = line;
        err
    })?;
    for token in &mut tokens {
        token.line = line;
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.exprlist()?;
    parser.eat(&Tok::Newline);
    if !parser.at(&Tok::Eof) {
        return Err(parser.unexpected("'}'"));
    }
    Ok(expr)
}

fn augmented_op(tok: &Tok) -> Option<BinOp> {
    match tok {
        Tok::PlusAssign => Some(BinOp::Add),
        Tok::MinusAssign => Some(BinOp::Sub),
        Tok::StarAssign => Some(BinOp::Mul),
        Tok::SlashAssign => Some(BinOp::Div),
        Tok::DoubleSlashAssign => Some(BinOp::FloorDiv),
        Tok::PercentAssign => Some(BinOp::Mod),
        _ => None,
    }
}

fn describe(tok: &Tok) -> String {
    let symbol = match tok {
        Tok::Ident(name) => return format!("'{name}'"),
        Tok::Number(value) => return format!("number {value}"),
        Tok::Str(_) | Tok::FStr(_) => return "string literal".to_string(),
        Tok::Newline => return "end of line".to_string(),
        Tok::Indent => return "indent".to_string(),
        Tok::Dedent => return "dedent".to_string(),
        Tok::Eof => return "end of input".to_string(),
        Tok::LParen => "(",
        Tok::RParen => ")",
        Tok::LBracket => "[",
        Tok::RBracket => "]",
        Tok::LBrace => "{",
        Tok::RBrace => "}",
        Tok::Comma => ",",
        Tok::Colon => ":",
        Tok::Semicolon => ";",
        Tok::Dot => ".",
        Tok::Arrow => "->",
        Tok::Assign => "=",
        Tok::PlusAssign => "+=",
        Tok::MinusAssign => "-=",
        Tok::StarAssign => "*=",
        Tok::SlashAssign => "/=",
        Tok::DoubleSlashAssign => "//=",
        Tok::PercentAssign => "%=",
        Tok::Plus => "+",
        Tok::Minus => "-",
        Tok::Star => "*",
        Tok::DoubleStar => "**",
        Tok::Slash => "/",
        Tok::DoubleSlash => "//",
        Tok::Percent => "%",
        Tok::Lt => "<",
        Tok::Gt => ">",
        Tok::Le => "<=",
        Tok::Ge => ">=",
        Tok::EqEq => "==",
        Tok::NotEq => "!=",
    };
    format!("'{symbol}'")
}

fn is_reserved(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn to_target(expr: Expr) -> Option<Target> {
    match expr {
        Expr::Name(name) => Some(Target::Name(name)),
        Expr::Attr(base, field) => Some(Target::Attr(*base, field)),
        Expr::Index(base, index) => Some(Target::Index(*base, *index)),
        _ => None,
    }
}

fn to_pattern(expr: Expr, line: usize) -> Result<Pattern, ScriptError> {
    match expr {
        Expr::Tuple(items) | Expr::List(items) => items
            .into_iter()
            .map(|item| to_pattern(item, line))
            .collect::<Result<Vec<_>, _>>()
            .map(Pattern::Tuple),
        other => to_target(other)
            .map(Pattern::Target)
            .ok_or_else(|| ScriptError::syntax(line, "cannot assign to expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> StmtKind {
        let mut program = parse_program(source).unwrap();
        assert_eq!(program.len(), 1);
        program.remove(0).kind
    }

    fn name(text: &str) -> Expr {
        Expr::Name(text.to_string())
    }

    #[test]
    fn parses_from_import_list() {
        assert_eq!(
            single("from dsviz import draw_array, Node as N\n"),
            StmtKind::FromImport {
                module: "dsviz".to_string(),
                names: ImportNames::Names(vec![
                    ("draw_array".to_string(), None),
                    ("Node".to_string(), Some("N".to_string())),
                ]),
            }
        );
        assert_eq!(
            single("from dsviz import *"),
            StmtKind::FromImport {
                module: "dsviz".to_string(),
                names: ImportNames::All,
            }
        );
    }

    #[test]
    fn parses_attribute_assignment() {
        let StmtKind::Assign { targets, .. } = single("root.left.right = Node(3)") else {
            panic!("expected assignment");
        };
        assert_eq!(
            targets,
            [Pattern::Target(Target::Attr(
                Expr::Attr(Box::new(name("root")), "left".to_string()),
                "right".to_string()
            ))]
        );
    }

    #[test]
    fn parses_swap_of_indexed_elements() {
        let StmtKind::Assign { targets, value } =
            single("arr[j], arr[j + 1] = arr[j + 1], arr[j]")
        else {
            panic!("expected assignment");
        };
        let Pattern::Tuple(items) = &targets[0] else {
            panic!("expected unpacking");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Pattern::Target(Target::Index(..))));
        assert!(matches!(value, Expr::Tuple(ref values) if values.len() == 2));
    }

    #[test]
    fn parses_keyword_arguments() {
        let StmtKind::Expr(Expr::Call { args, kwargs, .. }) =
            single("draw_array([1, 2], highlight_index=1, title='A')")
        else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let names: Vec<&str> = kwargs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["highlight_index", "title"]);
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let StmtKind::Expr(expr) = single("1 + 2 * 3") else {
            panic!("expected expression");
        };
        let Expr::Binary(_, BinOp::Add, rhs) = expr else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*rhs, Expr::Binary(_, BinOp::Mul, _)));
    }

    #[test]
    fn boolean_operators_bind_looser_than_comparisons() {
        let StmtKind::Expr(expr) = single("not a < b and c is not None or x in xs") else {
            panic!("expected expression");
        };
        let Expr::Logic(lhs, BoolOp::Or, rhs) = expr else {
            panic!("expected 'or' at the root");
        };
        let Expr::Logic(not, BoolOp::And, is_not) = *lhs else {
            panic!("expected 'and'");
        };
        assert!(matches!(*not, Expr::Not(ref inner) if matches!(**inner, Expr::Compare(..))));
        assert!(matches!(*is_not, Expr::Compare(_, ref ops) if ops[0].0 == CmpOp::IsNot));
        assert!(matches!(*rhs, Expr::Compare(_, ref ops) if ops[0].0 == CmpOp::In));
    }

    #[test]
    fn comparison_chains_keep_every_operator() {
        let StmtKind::Expr(Expr::Compare(_, ops)) = single("0 <= i < n != m") else {
            panic!("expected comparison");
        };
        let ops: Vec<CmpOp> = ops.into_iter().map(|(op, _)| op).collect();
        assert_eq!(ops, [CmpOp::Le, CmpOp::Lt, CmpOp::NotEq]);
    }

    #[test]
    fn parses_if_elif_else_chain() {
        let source = "if x > 1:\n    a = 1\nelif x == 1:\n    a = 2\nelse:\n    a = 3\nb = a\n";
        let program = parse_program(source).unwrap();
        assert_eq!(program.len(), 2);
        let StmtKind::If { branches, orelse } = &program[0].kind else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse.len(), 1);
        assert_eq!(orelse[0].line, 6);
        assert_eq!(program[1].line, 7);
    }

    #[test]
    fn parses_nested_loops_and_one_line_bodies() {
        let program = parse_program(
            "for i in range(2):\n    for j in [1]:\n        f(i, j)\ng()\nwhile n > 0: n -= 1\n",
        )
        .unwrap();
        assert_eq!(program.len(), 3);
        let StmtKind::For { body, .. } = &program[0].kind else {
            panic!("expected loop");
        };
        assert!(matches!(body[0].kind, StmtKind::For { .. }));
        assert_eq!(program[1].line, 4);
        let StmtKind::While { body, .. } = &program[2].kind else {
            panic!("expected while");
        };
        assert!(matches!(body[0].kind, StmtKind::AugAssign { op: BinOp::Sub, .. }));
    }

    #[test]
    fn parses_class_with_methods() {
        let source = "class Node:\n    \"\"\"A binary tree node.\"\"\"\n\
                      \x20   def __init__(self, value, left=None, right=None):\n\
                      \x20       self.value = value\n\
                      \x20       self.left = left\n\
                      \x20       self.right = right\n";
        let StmtKind::Class { name, bases, body } = single(source) else {
            panic!("expected class");
        };
        assert_eq!(name, "Node");
        assert!(bases.is_empty());
        assert_eq!(body.len(), 2);
        let StmtKind::Def(def) = &body[1].kind else {
            panic!("expected method");
        };
        let params: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, ["self", "value", "left", "right"]);
        assert_eq!(def.params[2].default, Some(Expr::None));
        assert_eq!(def.body.len(), 3);
    }

    #[test]
    fn annotations_are_parsed_and_dropped() {
        let StmtKind::Def(def) =
            single("def total(xs: list, start: int = 0) -> int:\n    return start\n")
        else {
            panic!("expected function");
        };
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.params[1].default, Some(Expr::Number(0.0)));
        assert!(matches!(single("count: int = 0"), StmtKind::Assign { .. }));
    }

    #[test]
    fn parses_comprehensions_and_slices() {
        let StmtKind::Assign { value, .. } = single("evens = [x * 2 for x in xs if x % 2 == 0]")
        else {
            panic!("expected assignment");
        };
        let Expr::ListComp { clauses, .. } = value else {
            panic!("expected comprehension");
        };
        assert_eq!(clauses[0].conditions.len(), 1);

        let StmtKind::Expr(Expr::Index(_, index)) = single("xs[1:-1]") else {
            panic!("expected index");
        };
        assert!(matches!(
            *index,
            Expr::Slice {
                lower: Some(_),
                upper: Some(_),
                step: None
            }
        ));
        assert!(matches!(
            single("total = sum(x for x in xs)"),
            StmtKind::Assign { .. }
        ));
        assert!(matches!(
            single("squares = {k: k * k for k in range(3)}"),
            StmtKind::Assign {
                value: Expr::DictComp { .. },
                ..
            }
        ));
    }

    #[test]
    fn format_string_fields_become_expressions() {
        let StmtKind::Expr(Expr::FString(parts)) = single("f'Pass {i + 1} of {n}'") else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(
            parts[1],
            FPart::Field {
                expr: Expr::Binary(_, BinOp::Add, _),
                ..
            }
        ));
        let err = parse_program("x = 1\ny = f'{x +}'\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn multiline_dict_literal() {
        let source = "g = {\n  'A': ['B'],\n  'B': ['A'],\n}\ndraw_graph(g)\n";
        let program = parse_program(source).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program[1].line, 5);
    }

    #[test]
    fn rejects_misplaced_and_unsupported_statements() {
        let err = parse_program("x = 1\ntry:\n    pass\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("'try' statements are not supported"));
        assert!(parse_program("return 1").is_err());
        assert!(parse_program("break").is_err());
        assert!(parse_program("def f():\n    for x in y:\n        pass\n    break\n").is_err());
        assert!(parse_program("f = lambda x: x").is_err());
        assert!(parse_program("def f(a=1, b):\n    pass\n").is_err());
        assert!(parse_program("f(a=1, 2)").is_err());
        assert!(parse_program("1 = x").is_err());
        assert!(parse_program("if x:\nf()\n").is_err());
    }
}
