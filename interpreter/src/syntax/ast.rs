use std::ops::Range;

/// A top-level or braced statement. Spans are byte offsets into the fragment code.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name <- value`, `name = value` or `value -> name`.
    Assignment {
        target: String,
        value: Expr,
        span: Range<usize>,
    },
    Expression { value: Expr, span: Range<usize> },
}

impl Statement {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Statement::Assignment { span, .. } | Statement::Expression { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,

    Variable(String, Range<usize>),

    /// `f(args)` or `pkg::f(args)`.
    Call {
        namespace: Option<String>,
        function: String,
        args: Vec<Argument>,
        span: Range<usize>,
    },
    /// `x[i]`
    Index { target: Box<Expr>, index: Box<Expr> },
    /// `table$column`
    Member { target: Box<Expr>, name: String },

    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    /// `{ a; b }`, evaluating to its last statement.
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negation,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Power,
    Modulo,
    IntegerDivision,
    /// `a:b`
    Sequence,
    Equality,
    Inequality,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    /// Element-wise `&`
    And,
    /// Element-wise `|`
    Or,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Addition => "+",
            BinaryOperator::Subtraction => "-",
            BinaryOperator::Multiplication => "*",
            BinaryOperator::Division => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Modulo => "%%",
            BinaryOperator::IntegerDivision => "%/%",
            BinaryOperator::Sequence => ":",
            BinaryOperator::Equality => "==",
            BinaryOperator::Inequality => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::And => "&",
            BinaryOperator::Or => "|",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
        }
    }
}
