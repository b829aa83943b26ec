use std::fmt;

use crate::error::{Result, SourceLine, TranslateError};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Segment {
    Constant,
    Local,
    Static,
    Argument,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn from_name(name: &str) -> Option<Segment> {
        match name {
            "constant" => Some(Segment::Constant),
            "local" => Some(Segment::Local),
            "static" => Some(Segment::Static),
            "argument" => Some(Segment::Argument),
            "this" => Some(Segment::This),
            "that" => Some(Segment::That),
            "pointer" => Some(Segment::Pointer),
            "temp" => Some(Segment::Temp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every VM operation the translator understands.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Kind {
    // Stack Basics
    Push,
    Pop,
    Add,
    Sub,
    Or,
    And,
    Eq,
    Lt,
    Gt,
    Neg,
    Not,

    // Control
    Label,
    Goto,
    IfGoto,

    // Functions
    Function,
    Call,
    Return,
}

impl Kind {
    pub fn keyword(self) -> &'static str {
        match self {
            Kind::Push => "push",
            Kind::Pop => "pop",
            Kind::Add => "add",
            Kind::Sub => "sub",
            Kind::Or => "or",
            Kind::And => "and",
            Kind::Eq => "eq",
            Kind::Lt => "lt",
            Kind::Gt => "gt",
            Kind::Neg => "neg",
            Kind::Not => "not",
            Kind::Label => "label",
            Kind::Goto => "goto",
            Kind::IfGoto => "if-goto",
            Kind::Function => "function",
            Kind::Call => "call",
            Kind::Return => "return",
        }
    }
}

/// One parsed source line, arguments not yet checked against the kind.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command {
    pub kind: Kind,
    pub arg1: Option<String>,
    pub arg2: Option<u16>,
    pub source: SourceLine,
}

/// A command whose arguments have been checked and typed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Operation {
    Push(Segment, u16),
    Pop(Segment, u16),
    Add,
    Sub,
    Or,
    And,
    Eq,
    Lt,
    Gt,
    Neg,
    Not,

    Label(String),
    Goto(String),
    IfGoto(String),

    Function(String, u16),
    Call(String, u16),
    Return,
}

/// Return addresses are labelled `<callee>$ret.<n>`.
pub const RETURN_LABEL_PREFIX: &str = "ret.";

fn is_symbol(sym: &str) -> bool {
    let mut chars = sym.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => {}
        _ => return false,
    }
    sym.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':'))
}

impl Command {
    pub fn new(kind: Kind, arg1: Option<&str>, arg2: Option<u16>, source: SourceLine) -> Self {
        Command {
            kind,
            arg1: arg1.map(str::to_string),
            arg2,
            source,
        }
    }

    fn arity_error(&self, expected: &str) -> TranslateError {
        TranslateError::Arity {
            reason: format!("'{}' expects {}", self.kind.keyword(), expected),
            at: self.source.clone(),
        }
    }

    fn symbol(&self, sym: &str) -> Result<String> {
        if is_symbol(sym) {
            Ok(sym.to_string())
        } else {
            Err(TranslateError::Parse {
                reason: format!("invalid symbol '{}'", sym),
                at: self.source.clone(),
            })
        }
    }

    fn segment(&self, name: &str) -> Result<Segment> {
        Segment::from_name(name).ok_or_else(|| TranslateError::InvalidSegment {
            segment: name.to_string(),
            at: self.source.clone(),
        })
    }

    fn no_args(&self) -> Result<()> {
        match (&self.arg1, self.arg2) {
            (None, None) => Ok(()),
            _ => Err(self.arity_error("no arguments")),
        }
    }

    fn name_arg(&self) -> Result<&str> {
        match (self.arg1.as_deref(), self.arg2) {
            (Some(name), None) => Ok(name),
            _ => Err(self.arity_error("exactly one argument")),
        }
    }

    fn name_and_number(&self) -> Result<(&str, u16)> {
        match (self.arg1.as_deref(), self.arg2) {
            (Some(name), Some(n)) => Ok((name, n)),
            _ => Err(self.arity_error("two arguments")),
        }
    }

    /// A branch target. `ret.<n>` is taken by generated return addresses.
    fn label(&self) -> Result<String> {
        let label = self.symbol(self.name_arg()?)?;
        let reserved = label
            .strip_prefix(RETURN_LABEL_PREFIX)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if reserved {
            return Err(TranslateError::Parse {
                reason: format!("label '{}' is reserved for return addresses", label),
                at: self.source.clone(),
            });
        }
        Ok(label)
    }

    /// Check the arguments against the kind and produce the typed operation.
    pub fn operation(&self) -> Result<Operation> {
        let op = match self.kind {
            Kind::Push => {
                let (segment, n) = self.name_and_number()?;
                Operation::Push(self.segment(segment)?, n)
            }
            Kind::Pop => {
                let (segment, n) = self.name_and_number()?;
                Operation::Pop(self.segment(segment)?, n)
            }
            Kind::Add => self.no_args().map(|_| Operation::Add)?,
            Kind::Sub => self.no_args().map(|_| Operation::Sub)?,
            Kind::Or => self.no_args().map(|_| Operation::Or)?,
            Kind::And => self.no_args().map(|_| Operation::And)?,
            Kind::Eq => self.no_args().map(|_| Operation::Eq)?,
            Kind::Lt => self.no_args().map(|_| Operation::Lt)?,
            Kind::Gt => self.no_args().map(|_| Operation::Gt)?,
            Kind::Neg => self.no_args().map(|_| Operation::Neg)?,
            Kind::Not => self.no_args().map(|_| Operation::Not)?,
            Kind::Label => Operation::Label(self.label()?),
            Kind::Goto => Operation::Goto(self.label()?),
            Kind::IfGoto => Operation::IfGoto(self.label()?),
            Kind::Function => {
                let (name, locals) = self.name_and_number()?;
                Operation::Function(self.symbol(name)?, locals)
            }
            Kind::Call => {
                let (name, args) = self.name_and_number()?;
                Operation::Call(self.symbol(name)?, args)
            }
            Kind::Return => self.no_args().map(|_| Operation::Return)?,
        };
        Ok(op)
    }
}
