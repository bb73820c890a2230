#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod expression;
mod lexer;
mod module;
mod parser;
mod pattern;
mod render;
mod statement;
mod token;
pub mod visit;

pub use expression::*;
pub use module::*;
pub use parser::*;
pub use pattern::*;
pub use render::*;
pub use statement::*;
pub use token::*;
pub use visit::Transformer;
