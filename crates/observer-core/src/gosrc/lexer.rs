//! Hand-written scanner for Go source.
//!
//! Comments are skipped (the splice-based renderer preserves them in the
//! output automatically); everything else becomes a spanned token.

use super::token::{Span, Token, TokenKind};
use super::ParseError;

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    /// Scan the whole input into a token vector.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        if b == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
        Some(b)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start_line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::UnterminatedComment { line: start_line })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        let line = self.line;
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let kind = match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                self.scan_identifier();
                TokenKind::Ident
            }
            // Unicode identifier start; Go allows any letter.
            0x80.. => {
                self.scan_identifier();
                TokenKind::Ident
            }
            b'0'..=b'9' => self.scan_number(),
            b'.' => {
                if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number()
                } else if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.pos += 3;
                    TokenKind::Ellipsis
                } else {
                    self.bump();
                    TokenKind::Dot
                }
            }
            b'"' => {
                self.scan_string(line)?;
                TokenKind::Str
            }
            b'`' => {
                self.scan_raw_string(line)?;
                TokenKind::RawStr
            }
            b'\'' => {
                self.scan_rune(line)?;
                TokenKind::Rune
            }
            b'(' => {
                self.bump();
                TokenKind::LParen
            }
            b')' => {
                self.bump();
                TokenKind::RParen
            }
            b'{' => {
                self.bump();
                TokenKind::LBrace
            }
            b'}' => {
                self.bump();
                TokenKind::RBrace
            }
            b'[' => {
                self.bump();
                TokenKind::LBracket
            }
            b']' => {
                self.bump();
                TokenKind::RBracket
            }
            b',' => {
                self.bump();
                TokenKind::Comma
            }
            b';' => {
                self.bump();
                TokenKind::Semi
            }
            _ => self.scan_operator(line)?,
        };

        Ok(Some(Token {
            kind,
            span: Span::new(start, self.pos),
            line,
        }))
    }

    fn scan_identifier(&mut self) {
        while let Some(b) = self.peek() {
            let continues = b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80;
            if !continues {
                break;
            }
            self.bump();
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let mut kind = TokenKind::Int;

        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X') | Some(b'b') | Some(b'B') | Some(b'o') | Some(b'O'))
        {
            self.bump();
            self.bump();
            while let Some(b) = self.peek() {
                if b.is_ascii_hexdigit() || b == b'_' {
                    self.bump();
                } else {
                    break;
                }
            }
            if self.peek() == Some(b'i') {
                self.bump();
                return TokenKind::Imag;
            }
            return TokenKind::Int;
        }

        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }

        if self.peek() == Some(b'.') && self.peek_at(1) != Some(b'.') {
            kind = TokenKind::Float;
            self.bump();
            while let Some(b) = self.peek() {
                if b.is_ascii_digit() || b == b'_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some(b'+') | Some(b'-')) {
                lookahead = 2;
            }
            if self.peek_at(lookahead).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::Float;
                for _ in 0..lookahead {
                    self.bump();
                }
                while let Some(b) = self.peek() {
                    if b.is_ascii_digit() || b == b'_' {
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        if self.peek() == Some(b'i') {
            self.bump();
            return TokenKind::Imag;
        }

        kind
    }

    fn scan_string(&mut self, line: u32) -> Result<(), ParseError> {
        self.bump(); // opening quote
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'\\') => {
                    self.bump();
                    if self.bump().is_none() {
                        return Err(ParseError::UnterminatedLiteral { line });
                    }
                }
                Some(b'\n') | None => return Err(ParseError::UnterminatedLiteral { line }),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_raw_string(&mut self, line: u32) -> Result<(), ParseError> {
        self.bump(); // opening backquote
        loop {
            match self.peek() {
                Some(b'`') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(ParseError::UnterminatedLiteral { line }),
            }
        }
    }

    fn scan_rune(&mut self, line: u32) -> Result<(), ParseError> {
        self.bump(); // opening quote
        loop {
            match self.peek() {
                Some(b'\'') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'\\') => {
                    self.bump();
                    if self.bump().is_none() {
                        return Err(ParseError::UnterminatedLiteral { line });
                    }
                }
                Some(b'\n') | None => return Err(ParseError::UnterminatedLiteral { line }),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_operator(&mut self, line: u32) -> Result<TokenKind, ParseError> {
        let rest = &self.src[self.pos..];

        // Longest match first; three-byte operators, then two, then one.
        const THREE: &[&str] = &["<<=", ">>=", "&^="];
        const TWO: &[(&str, TokenKind)] = &[
            ("<-", TokenKind::Arrow),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            (":=", TokenKind::Define),
            ("==", TokenKind::Op),
            ("!=", TokenKind::Op),
            ("<=", TokenKind::Op),
            (">=", TokenKind::Op),
            ("&&", TokenKind::Op),
            ("||", TokenKind::Op),
            ("+=", TokenKind::Op),
            ("-=", TokenKind::Op),
            ("*=", TokenKind::Op),
            ("/=", TokenKind::Op),
            ("%=", TokenKind::Op),
            ("&=", TokenKind::Op),
            ("|=", TokenKind::Op),
            ("^=", TokenKind::Op),
            ("<<", TokenKind::Op),
            (">>", TokenKind::Op),
            ("&^", TokenKind::Op),
        ];

        for op in THREE {
            if rest.starts_with(op) {
                self.pos += 3;
                return Ok(TokenKind::Op);
            }
        }
        for (op, kind) in TWO {
            if rest.starts_with(op) {
                self.pos += 2;
                return Ok(*kind);
            }
        }

        let b = self.peek().unwrap();
        let kind = match b {
            b'*' => TokenKind::Star,
            b'&' => TokenKind::Amp,
            b'=' => TokenKind::Assign,
            b':' => TokenKind::Colon,
            b'+' | b'-' | b'/' | b'%' | b'<' | b'>' | b'!' | b'|' | b'^' | b'~' => TokenKind::Op,
            other => {
                return Err(ParseError::UnexpectedCharacter {
                    ch: other as char,
                    line,
                })
            }
        };
        self.bump();
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_basic_declaration() {
        let toks = kinds("package reflect\n\nfunc ValueOf(i any) Value {}\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident, // package
                TokenKind::Ident, // reflect
                TokenKind::Ident, // func
                TokenKind::Ident, // ValueOf
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Ident,
                TokenKind::LBrace,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_but_strings_kept() {
        let src = "// leading\nimport \"unsafe\" /* trailing */\n";
        let toks = Lexer::new(src).tokenize().unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].text(src), "import");
        assert_eq!(toks[1].kind, TokenKind::Str);
        assert_eq!(toks[1].text(src), "\"unsafe\"");
    }

    #[test]
    fn tracks_lines() {
        let src = "a\nb\n\nc";
        let toks = Lexer::new(src).tokenize().unwrap();
        let lines: Vec<u32> = toks.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn raw_strings_may_span_lines() {
        let src = "x := `line1\nline2`";
        let toks = Lexer::new(src).tokenize().unwrap();
        assert_eq!(toks[2].kind, TokenKind::RawStr);
    }

    #[test]
    fn operators_longest_match() {
        let toks = kinds("a <<= b << c <- d := e ... f");
        assert!(toks.contains(&TokenKind::Arrow));
        assert!(toks.contains(&TokenKind::Define));
        assert!(toks.contains(&TokenKind::Ellipsis));
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(Lexer::new("\"oops\n").tokenize().is_err());
    }
}
