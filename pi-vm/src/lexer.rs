//! Source scanner: characters in, bracket-paired token array out.

use crate::error::{CompileError, CompileErrorKind, CompileResult, Span};
use crate::token::{keyword_kind, Token, TokenKind};

/// Tokenize a whole source buffer. The returned array always ends with
/// an `Eof` token; matching bracket tokens are linked through
/// `open_at`/`close_at`.
pub fn lex(source: &str) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        tokens: Vec::with_capacity(128),
        start: 0,
        current: 0,
        line: 1,
        column: 1,
        brackets: Vec::new(),
    };
    lexer.scan_tokens()?;
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    column: u32,
    brackets: Vec<usize>,
}

impl<'src> Lexer<'src> {
    fn scan_tokens(&mut self) -> CompileResult<()> {
        while !self.at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.start = self.current;
        self.add_token(TokenKind::Eof);
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(kind, self.span())
    }

    fn next(&mut self) -> u8 {
        let ch = self.bytes[self.current];
        self.current += 1;
        self.column += 1;
        ch
    }

    fn peek(&self, offset: usize) -> u8 {
        *self.bytes.get(self.current + offset).unwrap_or(&0)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        self.column += 1;
        true
    }

    fn matches_any(&mut self, set: &[u8]) -> bool {
        if !self.at_end() && set.contains(&self.bytes[self.current]) {
            self.current += 1;
            self.column += 1;
            return true;
        }
        false
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn scan_token(&mut self) -> CompileResult<()> {
        let ch = self.next();
        match ch {
            b' ' | b'\r' | b'\t' => {}
            b'\n' => self.newline(),
            b'/' => {
                if self.matches(b'/') {
                    while !self.at_end() && self.peek(0) != b'\n' {
                        self.next();
                    }
                } else if self.matches(b'*') {
                    self.block_comment()?;
                } else if self.matches(b'=') {
                    self.add_token(TokenKind::DivAssign);
                } else {
                    self.add_token(TokenKind::Div);
                }
            }
            b'[' => self.add_token(TokenKind::LBracket),
            b']' => self.add_token(TokenKind::RBracket),
            b'{' => self.add_token(TokenKind::LBrace),
            b'}' => self.add_token(TokenKind::RBrace),
            b'(' => self.add_token(TokenKind::LParen),
            b')' => self.add_token(TokenKind::RParen),
            b';' => self.add_token(TokenKind::Semicolon),
            b':' => self.add_token(TokenKind::Colon),
            b',' => self.add_token(TokenKind::Comma),
            b'?' => self.add_token(TokenKind::Question),
            b'#' => self.add_token(TokenKind::Hash),
            b'~' => self.add_token(TokenKind::BitNeg),
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                };
                self.add_token(kind);
            }
            b'*' => {
                let kind = if self.matches(b'*') {
                    TokenKind::Power
                } else if self.matches(b'=') {
                    TokenKind::MultAssign
                } else {
                    TokenKind::Mult
                };
                self.add_token(kind);
            }
            b'@' => self.add_token(TokenKind::DotProd),
            b'+' => {
                let kind = if self.matches(b'=') {
                    TokenKind::PlusAssign
                } else if self.matches(b'+') {
                    TokenKind::Incr
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            b'-' => {
                let kind = if self.matches(b'=') {
                    TokenKind::MinusAssign
                } else if self.matches(b'-') {
                    TokenKind::Decr
                } else if self.matches(b'>') {
                    TokenKind::RArrow
                } else {
                    TokenKind::Minus
                };
                self.add_token(kind);
            }
            b'%' => {
                let kind = if self.matches(b'=') {
                    TokenKind::ModAssign
                } else {
                    TokenKind::Mod
                };
                self.add_token(kind);
            }
            b'|' => {
                let kind = if self.matches(b'=') {
                    TokenKind::BitOrAssign
                } else if self.matches(b'|') {
                    TokenKind::Or
                } else {
                    TokenKind::BitOr
                };
                self.add_token(kind);
            }
            b'&' => {
                let kind = if self.matches(b'=') {
                    TokenKind::BitAndAssign
                } else if self.matches(b'&') {
                    TokenKind::And
                } else {
                    TokenKind::BitAnd
                };
                self.add_token(kind);
            }
            b'^' => {
                let kind = if self.matches(b'=') {
                    TokenKind::XorAssign
                } else {
                    TokenKind::Xor
                };
                self.add_token(kind);
            }
            b'!' => {
                let kind = if self.matches(b'=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                };
                self.add_token(kind);
            }
            b'<' => {
                let kind = if self.matches(b'=') {
                    TokenKind::LessEqual
                } else if self.matches(b'<') {
                    TokenKind::LShift
                } else if self.matches(b'-') {
                    TokenKind::LArrow
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            b'>' => {
                let kind = if self.matches(b'=') {
                    TokenKind::GreaterEqual
                } else if self.matches(b'>') {
                    if self.matches(b'>') {
                        TokenKind::URShift
                    } else {
                        TokenKind::RShift
                    }
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            b'"' | b'\'' => self.string(ch)?,
            b'.' => self.dot()?,
            _ if ch.is_ascii_digit() => self.number(ch)?,
            _ if is_alpha(ch) => self.identifier(),
            _ => {
                let ch = self.source[self.start..].chars().next().unwrap_or('\0');
                return Err(self.error(CompileErrorKind::StrayChar(ch)));
            }
        }
        Ok(())
    }

    fn block_comment(&mut self) -> CompileResult<()> {
        loop {
            if self.at_end() {
                return Err(self.error(CompileErrorKind::UnclosedComment));
            }
            let ch = self.next();
            if ch == b'\n' {
                self.newline();
            } else if ch == b'*' && self.matches(b'/') {
                return Ok(());
            }
        }
    }

    fn string(&mut self, quote: u8) -> CompileResult<()> {
        loop {
            if self.at_end() {
                return Err(self.error(CompileErrorKind::UnterminatedString));
            }
            let ch = self.next();
            if ch == quote {
                break;
            }
            match ch {
                b'\n' => self.newline(),
                // Escapes are recognized here but kept raw; the parser
                // unescapes when it builds the string constant.
                b'\\' if !self.at_end() => {
                    self.next();
                }
                _ => {}
            }
        }
        self.add_token(TokenKind::Str);
        Ok(())
    }

    fn dot(&mut self) -> CompileResult<()> {
        let before = if self.start == 0 {
            0
        } else {
            self.bytes[self.start - 1]
        };
        if self.peek(0).is_ascii_digit() && before != b']' && !is_alpha(before) {
            // A bare fractional literal such as `.5`.
            self.decimal_fraction()?;
            self.add_token(TokenKind::Num);
        } else if self.matches(b'.') {
            let kind = if self.matches(b'.') {
                TokenKind::Ellipsis
            } else if self.matches(b'=') {
                TokenKind::DbDotsEq
            } else {
                TokenKind::DbDots
            };
            self.add_token(kind);
        } else {
            self.add_token(TokenKind::Dot);
        }
        Ok(())
    }

    fn number(&mut self, first: u8) -> CompileResult<()> {
        if first == b'0' {
            if self.matches_any(b"xX") {
                if !self.peek(0).is_ascii_hexdigit() {
                    return Err(self.malformed("invalid hexadecimal literal"));
                }
                while self.peek(0).is_ascii_hexdigit() || self.peek(0) == b'_' {
                    self.next();
                }
            } else if self.matches_any(b"oO") {
                if !matches!(self.peek(0), b'0'..=b'7') {
                    return Err(self.malformed("invalid octal literal"));
                }
                while matches!(self.peek(0), b'0'..=b'7') {
                    self.next();
                }
            } else if self.matches_any(b"bB") {
                if !matches!(self.peek(0), b'0' | b'1') {
                    return Err(self.malformed("invalid binary literal"));
                }
                while matches!(self.peek(0), b'0' | b'1') {
                    self.next();
                }
            } else if self.peek(0) == b'.' && self.peek(1) != b'.' {
                self.next();
                self.decimal_fraction()?;
            } else if self.peek(0).is_ascii_digit() {
                return Err(self.malformed(
                    "leading zeros in decimal integer literals are not permitted",
                ));
            } else {
                self.exponent()?;
            }
        } else {
            while self.peek(0).is_ascii_digit() {
                self.next();
            }
            if self.peek(0) == b'.' && self.peek(1) != b'.' && self.peek(1).is_ascii_digit() {
                self.next();
                self.decimal_fraction()?;
            } else {
                self.exponent()?;
            }
        }
        self.add_token(TokenKind::Num);
        Ok(())
    }

    fn decimal_fraction(&mut self) -> CompileResult<()> {
        while self.peek(0).is_ascii_digit() {
            self.next();
        }
        self.exponent()
    }

    fn exponent(&mut self) -> CompileResult<()> {
        if self.matches_any(b"eE") {
            self.matches_any(b"+-");
            if !self.peek(0).is_ascii_digit() {
                return Err(self.malformed("exponent has no digits"));
            }
            while self.peek(0).is_ascii_digit() {
                self.next();
            }
        }
        Ok(())
    }

    fn malformed(&self, detail: &str) -> CompileError {
        self.error(CompileErrorKind::MalformedNumber(detail.into()))
    }

    fn identifier(&mut self) {
        while is_valid_id(self.peek(0)) {
            self.next();
        }
        let name = &self.source[self.start..self.current];
        self.add_token(keyword_kind(name).unwrap_or(TokenKind::Id));
    }

    fn add_token(&mut self, kind: TokenKind) {
        let (mut start, mut length) = (self.start, self.current - self.start);
        if kind == TokenKind::Str {
            // Strip the surrounding quotes.
            start += 1;
            length = length.saturating_sub(2);
        }

        let index = self.tokens.len();
        let mut token = Token {
            kind,
            start,
            length,
            line: self.line,
            column: self.column,
            skip: false,
            is_negative: false,
            open_at: -1,
            close_at: -1,
        };

        match kind {
            TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => {
                self.brackets.push(index);
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                // Mismatched closers are the parser's problem; the
                // indices just stay -1.
                if let Some(open) = self.brackets.pop() {
                    if complements(self.tokens[open].kind, kind) {
                        self.tokens[open].close_at = index as i32;
                        token.open_at = open as i32;
                    } else {
                        self.brackets.push(open);
                    }
                }
            }
            _ => {}
        }

        self.tokens.push(token);
    }
}

fn is_alpha(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_valid_id(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

fn complements(open: TokenKind, close: TokenKind) -> bool {
    matches!(
        (open, close),
        (TokenKind::LParen, TokenKind::RParen)
            | (TokenKind::LBrace, TokenKind::RBrace)
            | (TokenKind::LBracket, TokenKind::RBracket)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_operators_longest_first() {
        assert_eq!(
            kinds("a >>> b >> c > d"),
            vec![
                TokenKind::Id,
                TokenKind::URShift,
                TokenKind::Id,
                TokenKind::RShift,
                TokenKind::Id,
                TokenKind::Greater,
                TokenKind::Id,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x <- 1 .. 2 ..= 3 ..."),
            vec![
                TokenKind::Id,
                TokenKind::LArrow,
                TokenKind::Num,
                TokenKind::DbDots,
                TokenKind::Num,
                TokenKind::DbDotsEq,
                TokenKind::Num,
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(
            kinds("for x in xs"),
            vec![
                TokenKind::For,
                TokenKind::Id,
                TokenKind::In,
                TokenKind::Id,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("format")[0], TokenKind::Id);
    }

    #[test]
    fn lexemes_roundtrip_to_source() {
        let source = "let foo = 12.5 + bar(0xff, 'str')";
        let tokens = lex(source).unwrap();
        for token in &tokens {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let lexeme = token.text(source);
            assert!(
                source.contains(lexeme),
                "lexeme {lexeme:?} not found in source"
            );
        }
        // Quote stripping for strings.
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.text(source), "str");
    }

    #[test]
    fn brackets_pair_up() {
        let source = "f(a[1], {k: 2})";
        let tokens = lex(source).unwrap();
        for (i, token) in tokens.iter().enumerate() {
            if token.open_at >= 0 {
                let opener = &tokens[token.open_at as usize];
                assert!(complements(opener.kind, token.kind));
                assert_eq!(opener.close_at, i as i32);
            }
        }
        // Every closer in this source is paired.
        let paired = tokens.iter().filter(|t| t.open_at >= 0).count();
        assert_eq!(paired, 3);
    }

    #[test]
    fn stray_closers_stay_unpaired() {
        let tokens = lex(")").unwrap();
        assert_eq!(tokens[0].open_at, -1);
        assert_eq!(tokens[0].close_at, -1);
    }

    #[test]
    fn number_forms() {
        for src in ["0", "7", "3.25", ".5", "0.5", "1e9", "2.5e-3", "0xff", "0b101", "0o17"] {
            let tokens = lex(src).unwrap();
            assert_eq!(tokens[0].kind, TokenKind::Num, "source {src:?}");
            assert_eq!(tokens.len(), 2, "source {src:?}");
        }
    }

    #[test]
    fn bad_numbers_are_fatal() {
        for src in ["0x", "0b2", "012", "1e", "0o9"] {
            assert!(lex(src).is_err(), "source {src:?} should fail");
        }
    }

    #[test]
    fn comment_handling() {
        assert_eq!(
            kinds("1 // trailing\n2"),
            vec![TokenKind::Num, TokenKind::Num, TokenKind::Eof]
        );
        assert_eq!(
            kinds("1 /* a\nb */ 2"),
            vec![TokenKind::Num, TokenKind::Num, TokenKind::Eof]
        );
        assert!(matches!(
            lex("/* never closed").unwrap_err().kind,
            CompileErrorKind::UnclosedComment
        ));
    }

    #[test]
    fn unterminated_string_is_fatal() {
        assert!(matches!(
            lex("\"abc").unwrap_err().kind,
            CompileErrorKind::UnterminatedString
        ));
    }

    #[test]
    fn string_escapes_stay_raw() {
        let source = r#""a\"b""#;
        let tokens = lex(source).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text(source), r#"a\"b"#);
    }

    #[test]
    fn line_and_column_tracking() {
        let tokens = lex("a\n  b").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert!(tokens[1].column > tokens[0].column - 1);
    }

    #[test]
    fn dot_after_bracket_is_member_access() {
        assert_eq!(
            kinds("xs[0].5"),
            // `.` then a number, not a fractional literal.
            vec![
                TokenKind::Id,
                TokenKind::LBracket,
                TokenKind::Num,
                TokenKind::RBracket,
                TokenKind::Dot,
                TokenKind::Num,
                TokenKind::Eof
            ]
        );
    }
}
