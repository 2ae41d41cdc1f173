/*!
# Go source syntax layer

A hand-written scanner and recursive-descent parser for the slice of Go the
observer needs to see: package clauses, import declarations, top-level
function declarations (receivers, parameter names and classified types,
bodies), return sites with their first result expression, and qualified
`pkg.Member` selectors.

The layer deliberately does not build a full expression tree. Rewrites are
spans plus splices ([`EditSet`]), so everything outside the touched spans is
reproduced exactly, and validity of a rewrite is asserted by re-parsing the
rendered output.
*/

pub mod ast;
pub mod edit;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{
    FuncBody, FuncDecl, ImportDecl, ImportSpec, Param, Receiver, ReturnCall, ReturnExpr,
    ReturnSite, SelectorUse, SourceFile,
};
pub use edit::EditSet;
pub use parser::parse_file;
pub use token::Span;

/// Errors from scanning, parsing, or splice application.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected character {ch:?} on line {line}")]
    UnexpectedCharacter { ch: char, line: u32 },

    #[error("unterminated comment starting on line {line}")]
    UnterminatedComment { line: u32 },

    #[error("unterminated literal on line {line}")]
    UnterminatedLiteral { line: u32 },

    #[error("unexpected token `{found}` on line {line}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        line: u32,
    },

    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("missing package clause")]
    MissingPackageClause,

    #[error("unbalanced `{delim}` starting on line {line}")]
    UnbalancedDelimiter { delim: char, line: u32 },

    #[error("overlapping edits at byte offset {offset}")]
    OverlappingEdits { offset: usize },
}
