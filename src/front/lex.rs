//! The lexer.

use regex::Regex;

use crate::common::id;
use crate::error::{CompileError, Result};

use super::token::{Token, TokenKind};

/// Keywords recognized after an identifier-shaped lexeme has been scanned.
fn keyword(text: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match text {
        "true" => True,
        "false" => False,
        "while" => While,
        "if" => If,
        "else" => Else,
        "return" => Return,
        "int" => IntType,
        "float" => FloatType,
        "bool" => BoolType,
        "str" => StrType,
        "and" => And,
        "or" => Or,
        "not" => Not,
        _ => return None,
    })
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    ident: Regex,
    number: Regex,
    string: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\r\n]+|//[^\n]*)*").unwrap(),
            ident: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            number: Regex::new(r"\A[0-9]+(\.[0-9]+)?").unwrap(),
            string: Regex::new(r#"\A"[^"\n]*""#).unwrap(),
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end()
        }
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    /// Get the next token.
    ///
    /// Returns an `Eof` token (rather than `None`) once the input is
    /// exhausted, so callers can always look one token ahead uniformly.
    pub fn next(&mut self) -> Result<Token> {
        self.skip_whitespace();

        if self.end_of_input() {
            return Ok(Token::bare(TokenKind::Eof));
        }

        if let Some(m) = self.ident.find(self.rest()) {
            let text = m.as_str();
            self.pos += m.end();
            return Ok(match keyword(text) {
                Some(kind) => Token::bare(kind),
                None => Token::new(TokenKind::Id, id(text)),
            });
        }

        if let Some(m) = self.number.find(self.rest()) {
            let text = m.as_str();
            self.pos += m.end();
            let kind = if text.contains('.') {
                TokenKind::FloatLit
            } else {
                TokenKind::IntLit
            };
            return Ok(Token::new(kind, id(text)));
        }

        if let Some(m) = self.string.find(self.rest()) {
            let text = m.as_str();
            self.pos += m.end();
            return Ok(Token::new(TokenKind::StrLit, id(text)));
        }

        let c = self.rest().chars().next().unwrap();
        use TokenKind::*;
        let kind = match c {
            '(' => OParen,
            ')' => CParen,
            '{' => OBrace,
            '}' => CBrace,
            ',' => Comma,
            ';' => Semicolon,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '=' => {
                self.pos += 1;
                return Ok(Token::bare(self.maybe_eq('=', Equal, Assign)));
            }
            '<' => {
                self.pos += 1;
                return Ok(Token::bare(self.maybe_eq('=', LessEqual, Less)));
            }
            '>' => {
                self.pos += 1;
                return Ok(Token::bare(self.maybe_eq('=', GreaterEqual, Greater)));
            }
            '!' if self.rest().starts_with("!=") => {
                self.pos += 2;
                return Ok(Token::bare(NotEqual));
            }
            other => return Err(CompileError::UnexpectedChar(other, self.pos)),
        };
        self.pos += c.len_utf8();
        Ok(Token::bare(kind))
    }

    /// Having already consumed the first character of a one-or-two-character
    /// operator, check whether `follow` comes next and consume it too.
    fn maybe_eq(&mut self, follow: char, two_char: TokenKind, one_char: TokenKind) -> TokenKind {
        if self.rest().starts_with(follow) {
            self.pos += follow.len_utf8();
            two_char
        } else {
            one_char
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = vec![];
        loop {
            let tok = lexer.next().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_keywords_and_ids() {
        use TokenKind::*;
        assert_eq!(kinds("if x else while"), vec![If, Id, Else, While]);
    }

    #[test]
    fn lexes_two_char_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("< <= > >= = == !="),
            vec![Less, LessEqual, Greater, GreaterEqual, Assign, Equal, NotEqual]
        );
    }

    #[test]
    fn lexes_numbers() {
        let mut lexer = Lexer::new("42 3.14");
        let a = lexer.next().unwrap();
        let b = lexer.next().unwrap();
        assert_eq!(a.kind, TokenKind::IntLit);
        assert_eq!(*a.text, "42");
        assert_eq!(b.kind, TokenKind::FloatLit);
        assert_eq!(*b.text, "3.14");
    }

    #[test]
    fn skips_comments() {
        use TokenKind::*;
        assert_eq!(kinds("x // a comment\n+ y"), vec![Id, Plus, Id]);
    }

    #[test]
    fn rejects_unknown_char() {
        let mut lexer = Lexer::new("@");
        assert!(matches!(lexer.next(), Err(CompileError::UnexpectedChar('@', 0))));
    }
}
