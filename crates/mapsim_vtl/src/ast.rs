//! Syntax tree of a parsed template.

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A template: a sequence of nodes rendered in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Reference(Reference),
    Set {
        target: Reference,
        value: Expr,
        position: Position,
    },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
        position: Position,
    },
    Foreach {
        variable: String,
        iterable: Expr,
        body: Vec<Node>,
        position: Position,
    },
    Break(Position),
    Stop(Position),
    Parse {
        name: Expr,
        position: Position,
    },
    Include {
        name: Expr,
        position: Position,
    },
}

/// `$name.prop.method(args)[index]`
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub segments: Vec<Segment>,
    /// `$!name`: render nothing when null.
    pub quiet: bool,
    /// Source text, rendered as-is when the value is null.
    pub literal: String,
    pub position: Position,
}

impl Reference {
    /// Whether this is a lone variable with no member access.
    pub fn is_bare(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Property(String),
    Method { name: String, args: Vec<Expr> },
    Index(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Single-quoted, or double-quoted without references or directives.
    Str(String),
    /// Double-quoted string with embedded references or directives.
    Interpolated(Vec<Node>),
    List(Vec<Expr>),
    Range(Box<Expr>, Box<Expr>),
    Map(Vec<(Expr, Expr)>),
    Reference(Reference),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        position: Position,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: Position,
    },
}
