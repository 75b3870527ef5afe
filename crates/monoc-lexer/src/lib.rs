//! Tokenizer for the source language — the lexer/parser pair is treated as
//! an opaque function producing an AST plus parse diagnostics, so this
//! module is kept straightforward rather than held to the exhaustiveness
//! bar of the core pipeline stages downstream of it.

mod cursor;

use cursor::Cursor;
use monoc_common::span::Span;
use monoc_common::token::{Token, TokenKind};

/// Tokenize `source` into a flat token stream (no whitespace or comment
/// tokens), always ending in exactly one `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

struct Lexer<'src> {
    cursor: Cursor<'src>,
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self { cursor: Cursor::new(source), emitted_eof: false }
    }

    fn skip_trivia(&mut self) {
        loop {
            self.cursor.eat_while(|c| c.is_whitespace());
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (Some('/'), Some('/')) => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    loop {
                        match self.cursor.peek() {
                            None => break,
                            Some('*') if self.cursor.peek_next() == Some('/') => {
                                self.cursor.advance();
                                self.cursor.advance();
                                break;
                            }
                            _ => {
                                self.cursor.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.cursor.pos();
        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, Span::point(start), "");
        };

        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == '"' {
            return self.lex_string(start);
        }
        if c == '_' || c.is_alphabetic() {
            return self.lex_ident_or_keyword(start);
        }

        self.lex_operator(start)
    }

    fn lex_number(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let mut is_double = false;
        if self.cursor.peek() == Some('.') && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.cursor.peek(), Some('e') | Some('E')) {
            is_double = true;
            self.cursor.advance();
            if matches!(self.cursor.peek(), Some('+') | Some('-')) {
                self.cursor.advance();
            }
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        let end = self.cursor.pos();
        let text = self.cursor.slice(start, end).to_string();
        let kind = if is_double { TokenKind::DoubleLit } else { TokenKind::IntLit };
        Token::new(kind, Span::new(start, end), text)
    }

    fn lex_string(&mut self, start: u32) -> Token {
        self.cursor.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    self.cursor.advance();
                    match self.cursor.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some(other) => text.push(other),
                        None => break,
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.cursor.advance();
                }
            }
        }
        let end = self.cursor.pos();
        Token::new(TokenKind::StringLit, Span::new(start, end), text)
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c == '_' || c.is_alphanumeric());
        let end = self.cursor.pos();
        let text = self.cursor.slice(start, end).to_string();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident);
        Token::new(kind, Span::new(start, end), text)
    }

    fn lex_operator(&mut self, start: u32) -> Token {
        let two_char = |lexer: &mut Self, second: char, two: TokenKind, one: TokenKind| {
            lexer.cursor.advance();
            if lexer.cursor.peek() == Some(second) {
                lexer.cursor.advance();
                two
            } else {
                one
            }
        };

        let c = self.cursor.peek().unwrap();
        let kind = match c {
            '(' => { self.cursor.advance(); TokenKind::LParen }
            ')' => { self.cursor.advance(); TokenKind::RParen }
            '[' => { self.cursor.advance(); TokenKind::LBracket }
            ']' => { self.cursor.advance(); TokenKind::RBracket }
            '{' => { self.cursor.advance(); TokenKind::LBrace }
            '}' => { self.cursor.advance(); TokenKind::RBrace }
            ',' => { self.cursor.advance(); TokenKind::Comma }
            ';' => { self.cursor.advance(); TokenKind::Semicolon }
            ':' => { self.cursor.advance(); TokenKind::Colon }
            '?' => { self.cursor.advance(); TokenKind::Question }
            '.' => { self.cursor.advance(); TokenKind::Dot }
            '*' => two_char(self, '=', TokenKind::StarEq, TokenKind::Star),
            '/' => two_char(self, '=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => { self.cursor.advance(); TokenKind::Percent }
            '&' => two_char(self, '&', TokenKind::AndAnd, TokenKind::Amp),
            '|' => two_char(self, '|', TokenKind::OrOr, TokenKind::Unknown),
            '!' => two_char(self, '=', TokenKind::Ne, TokenKind::Bang),
            '=' => two_char(self, '=', TokenKind::EqEq, TokenKind::Eq),
            '<' => two_char(self, '=', TokenKind::Le, TokenKind::Lt),
            '>' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('=') => { self.cursor.advance(); TokenKind::Ge }
                    Some('>') => { self.cursor.advance(); TokenKind::Shr }
                    _ => TokenKind::Gt,
                }
            }
            '+' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('=') => { self.cursor.advance(); TokenKind::PlusEq }
                    Some('+') => { self.cursor.advance(); TokenKind::PlusPlus }
                    _ => TokenKind::Plus,
                }
            }
            '-' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('=') => { self.cursor.advance(); TokenKind::MinusEq }
                    Some('-') => { self.cursor.advance(); TokenKind::MinusMinus }
                    _ => TokenKind::Minus,
                }
            }
            _ => {
                self.cursor.advance();
                TokenKind::Unknown
            }
        };
        let end = self.cursor.pos();
        Token::new(kind, Span::new(start, end), self.cursor.slice(start, end))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_var_decl() {
        assert_eq!(
            kinds("var x = 1;"),
            vec![
                TokenKind::KwVar,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::IntLit,
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn distinguishes_int_and_double() {
        let tokens = tokenize("1 1.5 1e3");
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
        assert_eq!(tokens[1].kind, TokenKind::DoubleLit);
        assert_eq!(tokens[2].kind, TokenKind::DoubleLit);
    }

    #[test]
    fn lexes_string_with_escapes() {
        let tokens = tokenize(r#""a\nb""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].text, "a\nb");
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(kinds("// hi\nx /* block */ y"), vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("+= -= *= /= ++ -- == != <= >= && || >>"),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::EqEq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Shr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reserved_type_keywords_lex_as_keywords_not_idents() {
        assert_eq!(kinds("int double string bool void"), vec![
            TokenKind::KwInt, TokenKind::KwDouble, TokenKind::KwString, TokenKind::KwBool, TokenKind::KwVoid, TokenKind::Eof
        ]);
    }
}
