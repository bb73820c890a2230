use crate::{EmptyLine, Statement};
use serde::{Deserialize, Serialize};

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// The top-level statements.
    pub body: Vec<Statement>,
    /// Blank and comment lines after the last statement.
    pub footer: Vec<EmptyLine>,
    /// The first block indentation seen, used for new blocks.
    pub default_indent: String,
    /// The first line ending seen, used for new lines.
    pub default_newline: String,
}
