//! Token kinds produced by the lexer.

use derive_more::Display;

use crate::common::Id;

/// A single lexical token.
///
/// Literal and identifier tokens carry their matched lexeme in `text`; every
/// other kind carries an empty one (the kind alone is enough to reconstruct
/// the surface syntax).
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Id,
}

impl Token {
    pub fn new(kind: TokenKind, text: Id) -> Self {
        Token { kind, text }
    }

    pub fn bare(kind: TokenKind) -> Self {
        Token { kind, text: crate::common::id("") }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {:?})", self.kind, self.text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    #[display("true")]
    True,
    #[display("false")]
    False,
    #[display("while")]
    While,
    #[display("if")]
    If,
    #[display("else")]
    Else,
    #[display("return")]
    Return,

    #[display("int")]
    IntType,
    #[display("float")]
    FloatType,
    #[display("bool")]
    BoolType,
    #[display("str")]
    StrType,

    #[display("id")]
    Id,
    #[display("int literal")]
    IntLit,
    #[display("float literal")]
    FloatLit,
    #[display("string literal")]
    StrLit,

    #[display("(")]
    OParen,
    #[display(")")]
    CParen,
    #[display("{{")]
    OBrace,
    #[display("}}")]
    CBrace,

    #[display(",")]
    Comma,
    #[display(";")]
    Semicolon,

    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,

    #[display("<")]
    Less,
    #[display("<=")]
    LessEqual,
    #[display(">")]
    Greater,
    #[display(">=")]
    GreaterEqual,

    #[display("=")]
    Assign,
    #[display("==")]
    Equal,
    #[display("!=")]
    NotEqual,

    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("not")]
    Not,

    #[display("end of input")]
    Eof,
}
