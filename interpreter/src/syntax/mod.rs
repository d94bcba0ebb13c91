pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Argument, BinaryOperator, Expr, Statement, UnaryOperator};
pub use parser::parse_program;
