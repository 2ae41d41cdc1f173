//! Syntactic model of a Go source file, reduced to what the transformer and
//! the toolchain patcher act on: the package clause, import declarations,
//! top-level function declarations, return sites, and qualified selectors.
//!
//! Spans always refer to the original source bytes; rewrites are expressed
//! as splices against those spans (see [`super::edit`]).

use super::token::Span;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub package_name: String,
    /// Offset just past the newline ending the `package` clause line. Used
    /// as the fallback insertion point when a file has no imports at all.
    pub package_line_end: usize,
    pub imports: Vec<ImportDecl>,
    pub funcs: Vec<FuncDecl>,
    /// Every qualified selector `pkg.Member` whose base is a plain
    /// identifier (chained accesses like `a.b.c` contribute only `a.b`).
    pub selectors: Vec<SelectorUse>,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub grouped: bool,
    /// Offset of the closing `)` for a grouped declaration.
    pub rparen_offset: Option<usize>,
    pub specs: Vec<ImportSpec>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<String>,
    /// Unquoted import path.
    pub path: String,
    /// The whole source line holding the spec, newline included. Deleting
    /// this span removes the import.
    pub line_span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    /// Absent for assembly-backed declarations without a body.
    pub body: Option<FuncBody>,
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<String>,
    /// Type name with any `*` stripped, e.g. `Value` for `(v *Value)`.
    pub type_name: String,
    /// Classified type string as rendered for logging, e.g. `*Value`.
    pub type_desc: String,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    /// Classified type string: plain spelling, `bytes`, `slice:<elem>`,
    /// `interface`, `*<inner>`, `a.B`, or `unknown`.
    pub type_desc: String,
}

#[derive(Debug, Clone)]
pub struct FuncBody {
    /// Offset of the opening `{`.
    pub open_brace: usize,
    /// Offset of the matching `}`.
    pub close_brace: usize,
    pub returns: Vec<ReturnSite>,
}

#[derive(Debug, Clone)]
pub struct ReturnSite {
    /// Offset of the `return` keyword.
    pub return_offset: usize,
    /// First result expression, if the statement carries results.
    pub expr: Option<ReturnExpr>,
}

#[derive(Debug, Clone)]
pub struct ReturnExpr {
    /// Span of the complete first result expression.
    pub span: Span,
    /// Populated when the expression is a call whose callee is a selector.
    pub call: Option<ReturnCall>,
}

#[derive(Debug, Clone)]
pub struct ReturnCall {
    /// Selector name of the callee, e.g. `Method` in `v.Method(i)`.
    pub method: String,
    /// Argument expression spans, outermost commas only.
    pub args: Vec<Span>,
}

#[derive(Debug, Clone)]
pub struct SelectorUse {
    pub pkg: String,
    pub pkg_span: Span,
    pub member: String,
}

impl SourceFile {
    pub fn has_import(&self, path: &str) -> bool {
        self.imports
            .iter()
            .flat_map(|decl| decl.specs.iter())
            .any(|spec| spec.path == path)
    }

    /// Find the import spec for `path`, if any.
    pub fn find_import(&self, path: &str) -> Option<&ImportSpec> {
        self.imports
            .iter()
            .flat_map(|decl| decl.specs.iter())
            .find(|spec| spec.path == path)
    }

    /// Compute where and what to insert to add an import spec. Appends to
    /// the first grouped declaration when one exists, otherwise after the
    /// last single-form import, otherwise right below the package clause.
    pub fn import_insertion(&self, alias: Option<&str>, path: &str) -> (usize, String) {
        let spec_text = match alias {
            Some(alias) => format!("{alias} \"{path}\""),
            None => format!("\"{path}\""),
        };

        if let Some(decl) = self.imports.iter().find(|d| d.grouped) {
            if let Some(rparen) = decl.rparen_offset {
                return (rparen, format!("\t{spec_text}\n"));
            }
        }

        if let Some(last) = self
            .imports
            .iter()
            .flat_map(|decl| decl.specs.iter())
            .last()
        {
            return (last.line_span.end, format!("import {spec_text}\n"));
        }

        (self.package_line_end, format!("\nimport {spec_text}\n"))
    }
}
