//! Recursive-descent parser for the Go subset the observer rewrites.
//!
//! Whole-program fidelity is not the goal; positional fidelity is. The
//! parser recognizes the package clause, imports, and top-level function
//! declarations precisely, and skips over everything else with balanced
//! delimiter tracking and an automatic-semicolon-insertion rule that is
//! just strong enough to find declaration boundaries.

use super::ast::{
    FuncBody, FuncDecl, ImportDecl, ImportSpec, Param, Receiver, ReturnCall, ReturnExpr,
    ReturnSite, SelectorUse, SourceFile,
};
use super::lexer::Lexer;
use super::token::{can_end_statement, is_keyword, Span, Token, TokenKind};
use super::ParseError;

/// Parse Go source into the reduced syntactic model.
pub fn parse_file(src: &str) -> Result<SourceFile, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser {
        src,
        tokens,
        pos: 0,
    }
    .parse()
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Result<SourceFile, ParseError> {
        let (package_name, package_line_end) = self.parse_package_clause()?;

        let mut imports = Vec::new();
        let mut funcs = Vec::new();

        while let Some(token) = self.peek().copied() {
            match token.kind {
                TokenKind::Semi => {
                    self.pos += 1;
                }
                TokenKind::Ident => match token.text(self.src) {
                    "import" => imports.push(self.parse_import_decl()?),
                    "func" => funcs.push(self.parse_func_decl()?),
                    "var" | "const" | "type" => self.skip_gen_decl()?,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: other.to_string(),
                            expected: "top-level declaration",
                            line: token.line,
                        })
                    }
                },
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: token.text(self.src).to_string(),
                        expected: "top-level declaration",
                        line: token.line,
                    })
                }
            }
        }

        let selectors = self.scan_selectors();

        Ok(SourceFile {
            package_name,
            package_line_end,
            imports,
            funcs,
            selectors,
        })
    }

    // ---- token cursor -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.text(self.src).to_string(),
                expected,
                line: token.line,
            }),
            None => Err(ParseError::UnexpectedEof { expected }),
        }
    }

    fn expect_word(&mut self, word: &'static str) -> Result<Token, ParseError> {
        match self.advance() {
            Some(token) if token.is_ident(self.src, word) => Ok(token),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.text(self.src).to_string(),
                expected: word,
                line: token.line,
            }),
            None => Err(ParseError::UnexpectedEof { expected: word }),
        }
    }

    fn line_end_after(&self, offset: usize) -> usize {
        match self.src[offset..].find('\n') {
            Some(rel) => offset + rel + 1,
            None => self.src.len(),
        }
    }

    fn line_start_before(&self, offset: usize) -> usize {
        match self.src[..offset].rfind('\n') {
            Some(pos) => pos + 1,
            None => 0,
        }
    }

    // ---- declarations -------------------------------------------------

    fn parse_package_clause(&mut self) -> Result<(String, usize), ParseError> {
        let Some(first) = self.peek() else {
            return Err(ParseError::MissingPackageClause);
        };
        if !first.is_ident(self.src, "package") {
            return Err(ParseError::MissingPackageClause);
        }
        self.pos += 1;
        let name = self.expect_kind(TokenKind::Ident, "package name")?;
        let line_end = self.line_end_after(name.span.end);
        Ok((name.text(self.src).to_string(), line_end))
    }

    fn parse_import_decl(&mut self) -> Result<ImportDecl, ParseError> {
        self.expect_word("import")?;

        if self.peek().map(|t| t.kind) == Some(TokenKind::LParen) {
            self.pos += 1;
            let mut specs = Vec::new();
            loop {
                match self.peek() {
                    Some(token) if token.kind == TokenKind::RParen => {
                        let rparen = token.span.start;
                        self.pos += 1;
                        return Ok(ImportDecl {
                            grouped: true,
                            rparen_offset: Some(rparen),
                            specs,
                        });
                    }
                    Some(token) if token.kind == TokenKind::Semi => {
                        self.pos += 1;
                    }
                    Some(_) => specs.push(self.parse_import_spec()?),
                    None => return Err(ParseError::UnexpectedEof { expected: ")" }),
                }
            }
        }

        let spec = self.parse_import_spec()?;
        Ok(ImportDecl {
            grouped: false,
            rparen_offset: None,
            specs: vec![spec],
        })
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        let first = self
            .peek()
            .copied()
            .ok_or(ParseError::UnexpectedEof { expected: "import spec" })?;

        let alias = match first.kind {
            TokenKind::Ident => {
                self.pos += 1;
                Some(first.text(self.src).to_string())
            }
            TokenKind::Dot => {
                self.pos += 1;
                Some(".".to_string())
            }
            _ => None,
        };

        let path_token = match self.advance() {
            Some(token) if matches!(token.kind, TokenKind::Str | TokenKind::RawStr) => token,
            Some(token) => {
                return Err(ParseError::UnexpectedToken {
                    found: token.text(self.src).to_string(),
                    expected: "import path",
                    line: token.line,
                })
            }
            None => return Err(ParseError::UnexpectedEof { expected: "import path" }),
        };

        let raw = path_token.text(self.src);
        let path = raw[1..raw.len() - 1].to_string();

        let line_start = self.line_start_before(first.span.start);
        let line_end = self.line_end_after(path_token.span.end);

        Ok(ImportSpec {
            alias,
            path,
            line_span: Span::new(line_start, line_end),
        })
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        self.expect_word("func")?;

        let receiver = if self.peek().map(|t| t.kind) == Some(TokenKind::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };

        let name = self.expect_kind(TokenKind::Ident, "function name")?;
        let name = name.text(self.src).to_string();

        // Optional type parameter list.
        if self.peek().map(|t| t.kind) == Some(TokenKind::LBracket) {
            self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
        }

        let params = self.parse_params()?;
        self.skip_results()?;

        let body = if self.body_follows() {
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(FuncDecl {
            name,
            receiver,
            params,
            body,
        })
    }

    fn parse_receiver(&mut self) -> Result<Receiver, ParseError> {
        self.expect_kind(TokenKind::LParen, "(")?;

        let mut name = None;
        if let (Some(first), Some(second)) = (self.peek(), self.peek_at(1)) {
            if first.kind == TokenKind::Ident
                && !is_keyword(first.text(self.src))
                && second.kind != TokenKind::RParen
            {
                name = Some(first.text(self.src).to_string());
                self.pos += 1;
            }
        }

        let mut pointer = false;
        if self.peek().map(|t| t.kind) == Some(TokenKind::Star) {
            pointer = true;
            self.pos += 1;
        }

        let type_token = self.expect_kind(TokenKind::Ident, "receiver type")?;
        let type_name = type_token.text(self.src).to_string();

        // Generic receiver, e.g. `(v Value[T])`.
        if self.peek().map(|t| t.kind) == Some(TokenKind::LBracket) {
            self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
        }

        self.expect_kind(TokenKind::RParen, ")")?;

        let type_desc = if pointer {
            format!("*{type_name}")
        } else {
            type_name.clone()
        };

        Ok(Receiver {
            name,
            type_name,
            type_desc,
        })
    }

    /// Parse a parameter list, resolving Go's names-vs-types ambiguity the
    /// way a reader does: an identifier directly followed by a type is a
    /// parameter name; a bare identifier list closed by commas or `)` is a
    /// list of unnamed parameter types.
    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_kind(TokenKind::LParen, "(")?;

        let mut params = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        loop {
            let Some(token) = self.peek().copied() else {
                return Err(ParseError::UnexpectedEof { expected: ")" });
            };

            match token.kind {
                TokenKind::RParen => {
                    self.pos += 1;
                    // Any trailing pending identifiers were unnamed types.
                    return Ok(params);
                }
                TokenKind::Comma => {
                    self.pos += 1;
                }
                TokenKind::Ident
                    if !is_type_intro(token.text(self.src))
                        && matches!(
                            self.peek_at(1).map(|t| t.kind),
                            Some(TokenKind::Comma) | Some(TokenKind::RParen)
                        ) =>
                {
                    pending.push(token.text(self.src).to_string());
                    self.pos += 1;
                }
                TokenKind::Ident
                    if !is_type_intro(token.text(self.src))
                        && self.peek_at(1).is_some_and(|t| self.starts_type(t)) =>
                {
                    // Name followed by its type; earlier pending idents
                    // share the same type (`a, b Type`).
                    pending.push(token.text(self.src).to_string());
                    self.pos += 1;
                    let type_desc = self.parse_type()?;
                    for name in pending.drain(..) {
                        params.push(Param {
                            name,
                            type_desc: type_desc.clone(),
                        });
                    }
                }
                _ => {
                    // Unnamed parameter type (possibly qualified); nothing
                    // to log for it.
                    self.parse_type()?;
                    pending.clear();
                }
            }
        }
    }

    fn starts_type(&self, token: &Token) -> bool {
        match token.kind {
            TokenKind::Star
            | TokenKind::LBracket
            | TokenKind::Arrow
            | TokenKind::LParen
            | TokenKind::Ellipsis => true,
            TokenKind::Ident => {
                let text = token.text(self.src);
                !is_keyword(text) || is_type_intro(text)
            }
            _ => false,
        }
    }

    /// Skip over the result list, if present on the same line as the params.
    fn skip_results(&mut self) -> Result<(), ParseError> {
        let Some(token) = self.peek().copied() else {
            return Ok(());
        };
        let prev_line = self.tokens[self.pos - 1].line;
        if token.line != prev_line {
            return Ok(());
        }
        match token.kind {
            TokenKind::LParen => {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                Ok(())
            }
            _ if self.starts_type(&token) => {
                self.parse_type()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn body_follows(&self) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::LBrace => {
                self.pos == 0 || token.line == self.tokens[self.pos - 1].line
            }
            _ => false,
        }
    }

    fn parse_body(&mut self) -> Result<FuncBody, ParseError> {
        let open_idx = self.pos;
        let open = self.tokens[open_idx];
        let (_, close_idx) = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
        let close = self.tokens[close_idx];

        let returns = self.scan_returns(open_idx + 1, close_idx);

        Ok(FuncBody {
            open_brace: open.span.start,
            close_brace: close.span.start,
            returns,
        })
    }

    /// Skip a `var`, `const`, or `type` declaration, grouped or single.
    fn skip_gen_decl(&mut self) -> Result<(), ParseError> {
        let keyword = self.advance().expect("caller checked keyword");

        if self.peek().map(|t| t.kind) == Some(TokenKind::LParen) {
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
            return Ok(());
        }

        // Single specification: consume until a statement boundary at
        // nesting depth zero.
        let mut depth: i32 = 0;
        let mut last = keyword;
        while let Some(token) = self.peek().copied() {
            if depth == 0 {
                if token.kind == TokenKind::Semi {
                    self.pos += 1;
                    return Ok(());
                }
                if token.line > last.line && can_end_statement(last.kind, last.text(self.src)) {
                    return Ok(());
                }
            }
            match token.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => depth -= 1,
                _ => {}
            }
            last = token;
            self.pos += 1;
        }
        Ok(())
    }

    /// Advance past a balanced delimiter pair, returning the token indices
    /// of the opener and its closer. The cursor must sit on the opener.
    fn skip_balanced(
        &mut self,
        open: TokenKind,
        close: TokenKind,
    ) -> Result<(usize, usize), ParseError> {
        let open_idx = self.pos;
        let Some(open_token) = self.tokens.get(open_idx).copied() else {
            return Err(ParseError::UnexpectedEof {
                expected: "opening delimiter",
            });
        };
        if open_token.kind != open {
            return Err(ParseError::UnexpectedToken {
                found: open_token.text(self.src).to_string(),
                expected: "opening delimiter",
                line: open_token.line,
            });
        }
        self.pos += 1;

        let mut depth = 1;
        while let Some(token) = self.peek() {
            if token.kind == open {
                depth += 1;
            } else if token.kind == close {
                depth -= 1;
                if depth == 0 {
                    let close_idx = self.pos;
                    self.pos += 1;
                    return Ok((open_idx, close_idx));
                }
            }
            self.pos += 1;
        }

        Err(ParseError::UnbalancedDelimiter {
            delim: match open {
                TokenKind::LParen => '(',
                TokenKind::LBracket => '[',
                _ => '{',
            },
            line: open_token.line,
        })
    }

    // ---- types --------------------------------------------------------

    /// Parse a type, returning its classification for log rendering:
    /// plain spelling for named types, `bytes` for byte arrays, `slice:<e>`
    /// for other arrays and variadics, `interface`, `*<inner>` for
    /// pointers, `a.B` for qualified names, `unknown` otherwise.
    fn parse_type(&mut self) -> Result<String, ParseError> {
        let Some(token) = self.peek().copied() else {
            return Err(ParseError::UnexpectedEof { expected: "type" });
        };

        match token.kind {
            TokenKind::Ellipsis => {
                self.pos += 1;
                let elem = self.parse_type()?;
                Ok(slice_desc(&elem))
            }
            TokenKind::LBracket => {
                self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
                let elem = self.parse_type()?;
                Ok(slice_desc(&elem))
            }
            TokenKind::Star => {
                self.pos += 1;
                let inner = self.parse_type()?;
                Ok(format!("*{inner}"))
            }
            TokenKind::Arrow => {
                // Receive-only channel: `<-chan T`.
                self.pos += 1;
                self.expect_word("chan")?;
                self.parse_type()?;
                Ok("unknown".to_string())
            }
            TokenKind::LParen => {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                Ok("unknown".to_string())
            }
            TokenKind::Ident => match token.text(self.src) {
                "interface" => {
                    self.pos += 1;
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                    Ok("interface".to_string())
                }
                "struct" => {
                    self.pos += 1;
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                    Ok("unknown".to_string())
                }
                "map" => {
                    self.pos += 1;
                    self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
                    self.parse_type()?;
                    Ok("unknown".to_string())
                }
                "chan" => {
                    self.pos += 1;
                    if self.peek().map(|t| t.kind) == Some(TokenKind::Arrow) {
                        self.pos += 1;
                    }
                    self.parse_type()?;
                    Ok("unknown".to_string())
                }
                "func" => {
                    self.pos += 1;
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                    self.skip_results()?;
                    Ok("unknown".to_string())
                }
                name => {
                    self.pos += 1;
                    let mut desc = name.to_string();
                    if self.peek().map(|t| t.kind) == Some(TokenKind::Dot) {
                        if let Some(member) = self.peek_at(1) {
                            if member.kind == TokenKind::Ident {
                                desc = format!("{name}.{}", member.text(self.src));
                                self.pos += 2;
                            }
                        }
                    }
                    // Generic instantiation, e.g. `List[T]`.
                    if self.peek().map(|t| t.kind) == Some(TokenKind::LBracket) {
                        self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket)?;
                    }
                    Ok(desc)
                }
            },
            _ => Err(ParseError::UnexpectedToken {
                found: token.text(self.src).to_string(),
                expected: "type",
                line: token.line,
            }),
        }
    }

    // ---- return sites -------------------------------------------------

    fn scan_returns(&self, start: usize, end: usize) -> Vec<ReturnSite> {
        let mut sites = Vec::new();
        for idx in start..end {
            let token = self.tokens[idx];
            if !token.is_ident(self.src, "return") {
                continue;
            }

            let expr = match self.tokens.get(idx + 1) {
                Some(next)
                    if idx + 1 < end
                        && next.line == token.line
                        && !matches!(next.kind, TokenKind::RBrace | TokenKind::Semi) =>
                {
                    self.parse_first_result(idx + 1, end)
                }
                _ => None,
            };

            sites.push(ReturnSite {
                return_offset: token.span.start,
                expr,
            });
        }
        sites
    }

    /// Parse the first result expression of a return statement starting at
    /// token index `start`, without moving the parser cursor. Returns the
    /// expression span plus selector-call details when the expression is a
    /// call through a selector.
    fn parse_first_result(&self, start: usize, end: usize) -> Option<ReturnExpr> {
        let mut idx = start;
        let expr_start = self.tokens[idx].span.start;
        let mut last_selector: Option<String> = None;
        let mut call: Option<ReturnCall> = None;
        let mut binary = false;

        loop {
            // Unary prefix operators.
            while idx < end {
                let t = self.tokens[idx];
                if matches!(t.kind, TokenKind::Star | TokenKind::Amp | TokenKind::Arrow)
                    || (t.kind == TokenKind::Op
                        && matches!(t.text(self.src), "-" | "+" | "!" | "^"))
                {
                    idx += 1;
                } else {
                    break;
                }
            }

            idx = self.parse_operand(idx, end)?;

            // Postfix chain.
            loop {
                let Some(t) = self.tokens.get(idx) else { break };
                if idx >= end {
                    break;
                }
                match t.kind {
                    TokenKind::Dot => {
                        let Some(member) = self.tokens.get(idx + 1) else { break };
                        if member.kind != TokenKind::Ident {
                            // Type assertion `x.(T)`: skip the parens.
                            if member.kind == TokenKind::LParen {
                                idx = self.matching_close(idx + 1, TokenKind::LParen, TokenKind::RParen)? + 1;
                                last_selector = None;
                                continue;
                            }
                            break;
                        }
                        last_selector = Some(member.text(self.src).to_string());
                        idx += 2;
                    }
                    TokenKind::LParen => {
                        // A call opener on a later line belongs to the next
                        // statement under semicolon insertion.
                        if t.line > self.tokens[idx - 1].line {
                            break;
                        }
                        let close = self.matching_close(idx, TokenKind::LParen, TokenKind::RParen)?;
                        let args = self.split_call_args(idx, close);
                        call = last_selector.take().map(|method| ReturnCall { method, args });
                        idx = close + 1;
                    }
                    TokenKind::LBracket => {
                        if t.line > self.tokens[idx - 1].line {
                            break;
                        }
                        idx = self.matching_close(idx, TokenKind::LBracket, TokenKind::RBracket)? + 1;
                        last_selector = None;
                        call = None;
                    }
                    TokenKind::LBrace => {
                        // Composite literal (`Value{...}`); only plausible
                        // directly after a name, never after a call.
                        if call.is_some() || t.line > self.tokens[idx - 1].line {
                            break;
                        }
                        idx = self.matching_close(idx, TokenKind::LBrace, TokenKind::RBrace)? + 1;
                        last_selector = None;
                    }
                    _ => break,
                }
            }

            // Binary continuation keeps the span growing but the result is
            // no longer a bare call expression.
            match self.tokens.get(idx) {
                Some(t)
                    if idx < end
                        && (matches!(t.kind, TokenKind::Star | TokenKind::Amp)
                            || (t.kind == TokenKind::Op && t.text(self.src) != "!"))
                        && t.line == self.tokens[idx - 1].line =>
                {
                    binary = true;
                    idx += 1;
                }
                _ => break,
            }
        }

        let last = self.tokens.get(idx.saturating_sub(1))?;
        let expr = ReturnExpr {
            span: Span::new(expr_start, last.span.end),
            call: if binary { None } else { call },
        };
        Some(expr)
    }

    fn parse_operand(&self, idx: usize, end: usize) -> Option<usize> {
        let token = self.tokens.get(idx)?;
        if idx >= end {
            return None;
        }
        match token.kind {
            TokenKind::Ident => match token.text(self.src) {
                "func" => {
                    // Function literal: params, optional result, body.
                    let mut i = idx + 1;
                    i = self.matching_close(i, TokenKind::LParen, TokenKind::RParen)? + 1;
                    while let Some(t) = self.tokens.get(i) {
                        if t.kind == TokenKind::LBrace {
                            break;
                        }
                        i += 1;
                    }
                    Some(self.matching_close(i, TokenKind::LBrace, TokenKind::RBrace)? + 1)
                }
                "map" | "struct" | "interface" => {
                    // Type-led composite; skip to and over the brace block.
                    let mut i = idx + 1;
                    while let Some(t) = self.tokens.get(i) {
                        if t.kind == TokenKind::LBrace {
                            return Some(
                                self.matching_close(i, TokenKind::LBrace, TokenKind::RBrace)? + 1,
                            );
                        }
                        i += 1;
                    }
                    None
                }
                _ => Some(idx + 1),
            },
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Rune
            | TokenKind::Str
            | TokenKind::RawStr => Some(idx + 1),
            TokenKind::LParen => {
                Some(self.matching_close(idx, TokenKind::LParen, TokenKind::RParen)? + 1)
            }
            TokenKind::LBracket => {
                // Slice/array literal: `[]T{...}` or `[N]T{...}`.
                let mut i = self.matching_close(idx, TokenKind::LBracket, TokenKind::RBracket)? + 1;
                while let Some(t) = self.tokens.get(i) {
                    if t.kind == TokenKind::LBrace {
                        return Some(
                            self.matching_close(i, TokenKind::LBrace, TokenKind::RBrace)? + 1,
                        );
                    }
                    i += 1;
                }
                None
            }
            _ => None,
        }
    }

    /// Token index of the closer matching the opener at `open_idx`.
    fn matching_close(&self, open_idx: usize, open: TokenKind, close: TokenKind) -> Option<usize> {
        if self.tokens.get(open_idx)?.kind != open {
            return None;
        }
        let mut depth = 1;
        let mut idx = open_idx + 1;
        while let Some(token) = self.tokens.get(idx) {
            if token.kind == open {
                depth += 1;
            } else if token.kind == close {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            idx += 1;
        }
        None
    }

    /// Split the argument list of a call between `open_idx` and `close_idx`
    /// into per-argument spans at top-level commas.
    fn split_call_args(&self, open_idx: usize, close_idx: usize) -> Vec<Span> {
        let mut args = Vec::new();
        let mut depth = 0;
        let mut arg_start: Option<usize> = None;
        let mut arg_end = 0;

        for idx in open_idx + 1..close_idx {
            let token = self.tokens[idx];
            match token.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => depth -= 1,
                TokenKind::Comma if depth == 0 => {
                    if let Some(start) = arg_start.take() {
                        args.push(Span::new(start, arg_end));
                    }
                    continue;
                }
                _ => {}
            }
            if arg_start.is_none() {
                arg_start = Some(token.span.start);
            }
            arg_end = token.span.end;
        }
        if let Some(start) = arg_start {
            args.push(Span::new(start, arg_end));
        }
        args
    }

    // ---- selectors ----------------------------------------------------

    /// Collect every `pkg.Member` selector whose base is a plain
    /// identifier. Chained accesses (`a.b.c`) only yield the leading pair,
    /// mirroring how a selector's base must be a bare identifier to name a
    /// package.
    fn scan_selectors(&self) -> Vec<SelectorUse> {
        let mut uses = Vec::new();
        for idx in 1..self.tokens.len().saturating_sub(1) {
            if self.tokens[idx].kind != TokenKind::Dot {
                continue;
            }
            let base = self.tokens[idx - 1];
            let member = self.tokens[idx + 1];
            if base.kind != TokenKind::Ident || member.kind != TokenKind::Ident {
                continue;
            }
            if is_keyword(base.text(self.src)) {
                continue;
            }
            if idx >= 2 && self.tokens[idx - 2].kind == TokenKind::Dot {
                continue;
            }
            uses.push(SelectorUse {
                pkg: base.text(self.src).to_string(),
                pkg_span: base.span,
                member: member.text(self.src).to_string(),
            });
        }
        uses
    }
}

fn slice_desc(elem: &str) -> String {
    if elem == "byte" {
        "bytes".to_string()
    } else {
        format!("slice:{elem}")
    }
}

fn is_type_intro(word: &str) -> bool {
    matches!(word, "interface" | "struct" | "map" | "chan" | "func")
}
