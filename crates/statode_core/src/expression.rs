//! Text expressions for right-hand sides and reference solutions.
//!
//! Expressions are parsed into an AST, compiled to bytecode and evaluated on a
//! small stack machine. Identifiers resolve to the time variable `t` or to a
//! caller-supplied list of state names.

use crate::traits::{constant, DynamicalSystem, Scalar};
use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// Name of the independent variable.
pub const TIME_VARIABLE: &str = "t";

/// `y0, y1, ..., y{dim-1}`
pub fn state_names(dim: usize) -> Vec<String> {
    (0..dim).map(|i| format!("y{i}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    LoadConst(f64),
    LoadTime,
    /// Pushes state component `idx`.
    LoadVar(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Call(Function),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        })
    }

    fn eval<T: Scalar>(self, x: T) -> T {
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Sqrt => x.sqrt(),
            Function::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack machine for [`Bytecode`].
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, t: T, vars: &[T], stack: &mut Vec<T>) -> T {
        fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
            stack.pop().unwrap_or_else(T::nan)
        }

        stack.clear();
        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(v) => constant(v),
                OpCode::LoadTime => t,
                OpCode::LoadVar(idx) => vars[idx],
                OpCode::Neg => -pop(stack),
                OpCode::Call(func) => func.eval(pop(stack)),
                binary => {
                    let b = pop(stack);
                    let a = pop(stack);
                    match binary {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    }
                }
            };
            stack.push(value);
        }
        pop(stack)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

/// Resolves names to stack-machine operands.
pub struct Compiler {
    var_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { var_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.emit(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn emit(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if name == TIME_VARIABLE {
                    ops.push(OpCode::LoadTime);
                } else {
                    bail!("Unknown variable '{name}'.");
                }
            }
            Expr::Binary(left, op, right) => {
                self.emit(left, ops)?;
                self.emit(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    _ => bail!("Unknown binary operator '{op}'."),
                });
            }
            Expr::Neg(operand) => {
                self.emit(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(name, arg) => {
                let func =
                    Function::lookup(name).ok_or_else(|| anyhow!("Unknown function '{name}'."))?;
                self.emit(arg, ops)?;
                ops.push(OpCode::Call(func));
            }
        }
        Ok(())
    }
}

/// Parses `input` into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected trailing input at {token:?} in '{input}'.");
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // `e` starts an exponent only when digits follow it
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse()
                .map_err(|_| anyhow!("Invalid number '{literal}'."))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Identifier(chars[start..i].iter().collect()));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => bail!("Unexpected character '{other}'."),
            });
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.bump() {
            Some(Token::RParen) => Ok(()),
            _ => bail!("Expected ')'."),
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => '+',
                Some(Token::Minus) => '-',
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => '*',
                Some(Token::Slash) => '/',
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // unary := '-' unary | power
    fn unary(&mut self) -> Result<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    // power := primary ('^' unary)?   (right-associative, binds tighter than unary minus)
    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let arg = self.expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => bail!("Unexpected token {token:?}."),
            None => bail!("Unexpected end of expression."),
        }
    }
}

/// Compiles each expression against `var_names`.
pub fn compile_all<S: AsRef<str>>(expressions: &[S], var_names: &[String]) -> Result<Vec<Bytecode>> {
    let compiler = Compiler::new(var_names);
    expressions
        .iter()
        .map(|source| {
            let source = source.as_ref();
            let expr = parse(source).map_err(|err| anyhow!("In '{source}': {err}"))?;
            compiler
                .compile(&expr)
                .map_err(|err| anyhow!("In '{source}': {err}"))
        })
        .collect()
}

/// ODE right-hand side given as one expression per state component.
pub struct ExpressionSystem<T: Scalar> {
    equations: Vec<Bytecode>,
    // Scratch stack reused across calls; makes the system !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> ExpressionSystem<T> {
    /// Equation `i` defines `d y_i / dt`; state components are named `y0, y1, ...`.
    pub fn compile<S: AsRef<str>>(equations: &[S]) -> Result<Self> {
        Self::compile_with_names(equations, &state_names(equations.len()))
    }

    pub fn compile_with_names<S: AsRef<str>>(equations: &[S], var_names: &[String]) -> Result<Self> {
        if equations.is_empty() {
            bail!("At least one equation is required.");
        }
        if var_names.len() != equations.len() {
            bail!(
                "Expected {} state names, got {}.",
                equations.len(),
                var_names.len()
            );
        }
        Ok(Self {
            equations: compile_all(equations, var_names)?,
            stack: RefCell::new(Vec::with_capacity(32)),
        })
    }
}

impl<T: Scalar> DynamicalSystem<T> for ExpressionSystem<T> {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        for (slot, eq) in out.iter_mut().zip(&self.equations) {
            *slot = VM::execute(eq, t, x, &mut stack);
        }
    }
}

/// Vector-valued function of `t`, used as a reference solution.
pub struct ExpressionSolution {
    components: Vec<Bytecode>,
    stack: RefCell<Vec<f64>>,
}

impl ExpressionSolution {
    pub fn compile<S: AsRef<str>>(components: &[S]) -> Result<Self> {
        if components.is_empty() {
            bail!("At least one solution component is required.");
        }
        Ok(Self {
            components: compile_all(components, &[])?,
            stack: RefCell::new(Vec::with_capacity(32)),
        })
    }

    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    pub fn eval(&self, t: f64) -> Vec<f64> {
        let mut stack = self.stack.borrow_mut();
        self.components
            .iter()
            .map(|code| VM::execute(code, t, &[], &mut stack))
            .collect()
    }
}
