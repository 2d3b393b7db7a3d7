//! Tokenizer for Lumen source.
//!
//! Produces a flat list of [`Spanned`] tokens. Whitespace and comments are
//! skipped; the stream always ends with [`Token::Eof`].

use std::fmt;

use crate::error::ParseError;
use crate::span::{Span, Spanned};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    Char(char),

    // Keywords
    KwInt,
    KwDouble,
    KwBool,
    KwString,
    KwChar,
    KwVoid,
    KwVar,
    KwStatic,
    KwIf,
    KwElse,
    KwWhile,
    KwDo,
    KwFor,
    KwForeach,
    KwIn,
    KwBreak,
    KwContinue,
    KwReturn,
    KwNew,
    KwTrue,
    KwFalse,
    KwUnsafe,
    KwSpawn,

    // Punctuation
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Semicolon,
    Comma,
    Dot,
    Question,
    Colon,

    // Operators
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Shl,
    Shr,

    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "int" => Token::KwInt,
            "double" => Token::KwDouble,
            "bool" => Token::KwBool,
            "string" => Token::KwString,
            "char" => Token::KwChar,
            "void" => Token::KwVoid,
            "var" => Token::KwVar,
            "static" => Token::KwStatic,
            "if" => Token::KwIf,
            "else" => Token::KwElse,
            "while" => Token::KwWhile,
            "do" => Token::KwDo,
            "for" => Token::KwFor,
            "foreach" => Token::KwForeach,
            "in" => Token::KwIn,
            "break" => Token::KwBreak,
            "continue" => Token::KwContinue,
            "return" => Token::KwReturn,
            "new" => Token::KwNew,
            "true" => Token::KwTrue,
            "false" => Token::KwFalse,
            "unsafe" => Token::KwUnsafe,
            "spawn" => Token::KwSpawn,
            _ => return None,
        };
        Some(token)
    }

    /// Whether this token starts a type in declaration position.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            Token::KwInt
                | Token::KwDouble
                | Token::KwBool
                | Token::KwString
                | Token::KwChar
                | Token::KwVoid
                | Token::KwVar
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Ident(name) => return write!(f, "identifier '{name}'"),
            Token::Int(v) => return write!(f, "integer {v}"),
            Token::Double(v) => return write!(f, "number {v}"),
            Token::Str(_) => "string literal",
            Token::Char(_) => "char literal",
            Token::KwInt => "'int'",
            Token::KwDouble => "'double'",
            Token::KwBool => "'bool'",
            Token::KwString => "'string'",
            Token::KwChar => "'char'",
            Token::KwVoid => "'void'",
            Token::KwVar => "'var'",
            Token::KwStatic => "'static'",
            Token::KwIf => "'if'",
            Token::KwElse => "'else'",
            Token::KwWhile => "'while'",
            Token::KwDo => "'do'",
            Token::KwFor => "'for'",
            Token::KwForeach => "'foreach'",
            Token::KwIn => "'in'",
            Token::KwBreak => "'break'",
            Token::KwContinue => "'continue'",
            Token::KwReturn => "'return'",
            Token::KwNew => "'new'",
            Token::KwTrue => "'true'",
            Token::KwFalse => "'false'",
            Token::KwUnsafe => "'unsafe'",
            Token::KwSpawn => "'spawn'",
            Token::ParenOpen => "'('",
            Token::ParenClose => "')'",
            Token::BraceOpen => "'{'",
            Token::BraceClose => "'}'",
            Token::BracketOpen => "'['",
            Token::BracketClose => "']'",
            Token::Semicolon => "';'",
            Token::Comma => "','",
            Token::Dot => "'.'",
            Token::Question => "'?'",
            Token::Colon => "':'",
            Token::Assign => "'='",
            Token::PlusAssign => "'+='",
            Token::MinusAssign => "'-='",
            Token::StarAssign => "'*='",
            Token::SlashAssign => "'/='",
            Token::PercentAssign => "'%='",
            Token::AmpAssign => "'&='",
            Token::PipeAssign => "'|='",
            Token::CaretAssign => "'^='",
            Token::ShlAssign => "'<<='",
            Token::ShrAssign => "'>>='",
            Token::PlusPlus => "'++'",
            Token::MinusMinus => "'--'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::Amp => "'&'",
            Token::Pipe => "'|'",
            Token::Caret => "'^'",
            Token::Tilde => "'~'",
            Token::Bang => "'!'",
            Token::AmpAmp => "'&&'",
            Token::PipePipe => "'||'",
            Token::EqEq => "'=='",
            Token::NotEq => "'!='",
            Token::Less => "'<'",
            Token::LessEq => "'<='",
            Token::Greater => "'>'",
            Token::GreaterEq => "'>='",
            Token::Shl => "'<<'",
            Token::Shr => "'>>'",
            Token::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Operators ordered longest first so that maximal munch falls out of a scan.
const OPERATORS: &[(&str, Token)] = &[
    ("<<=", Token::ShlAssign),
    (">>=", Token::ShrAssign),
    ("+=", Token::PlusAssign),
    ("-=", Token::MinusAssign),
    ("*=", Token::StarAssign),
    ("/=", Token::SlashAssign),
    ("%=", Token::PercentAssign),
    ("&=", Token::AmpAssign),
    ("|=", Token::PipeAssign),
    ("^=", Token::CaretAssign),
    ("++", Token::PlusPlus),
    ("--", Token::MinusMinus),
    ("&&", Token::AmpAmp),
    ("||", Token::PipePipe),
    ("==", Token::EqEq),
    ("!=", Token::NotEq),
    ("<=", Token::LessEq),
    (">=", Token::GreaterEq),
    ("<<", Token::Shl),
    (">>", Token::Shr),
    ("(", Token::ParenOpen),
    (")", Token::ParenClose),
    ("{", Token::BraceOpen),
    ("}", Token::BraceClose),
    ("[", Token::BracketOpen),
    ("]", Token::BracketClose),
    (";", Token::Semicolon),
    (",", Token::Comma),
    (".", Token::Dot),
    ("?", Token::Question),
    (":", Token::Colon),
    ("=", Token::Assign),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("&", Token::Amp),
    ("|", Token::Pipe),
    ("^", Token::Caret),
    ("~", Token::Tilde),
    ("!", Token::Bang),
    ("<", Token::Less),
    (">", Token::Greater),
];

struct Lexer<'src> {
    source: &'src str,
    pos: usize,
}

/// Tokenizes `source`, returning every token followed by [`Token::Eof`].
pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, ParseError> {
    let mut lexer = Lexer { source, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let start = lexer.pos;
        let Some(ch) = lexer.peek() else {
            tokens.push(Spanned {
                span: Span::new(start, start),
                node: Token::Eof,
            });
            return Ok(tokens);
        };

        let token = if ch.is_ascii_alphabetic() || ch == '_' {
            lexer.word()
        } else if ch.is_ascii_digit() {
            lexer.number()?
        } else if ch == '"' {
            lexer.string()?
        } else if ch == '\'' {
            lexer.char_literal()?
        } else {
            lexer.operator()?
        };

        tokens.push(Spanned {
            span: Span::new(start, lexer.pos),
            node: token,
        });
    }
}

impl<'src> Lexer<'src> {
    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let rest = self.rest();
            if let Some(ch) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.pos += ch.len_utf8();
            } else if rest.starts_with("//") {
                let line_len = rest.find('\n').unwrap_or(rest.len());
                self.pos += line_len;
            } else if rest.starts_with("/*") {
                let start = self.pos;
                match rest[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => {
                        return Err(ParseError::UnterminatedComment {
                            span: Span::new(start, self.source.len()),
                        })
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word = &self.source[start..self.pos];
        Token::keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()))
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_double = false;
        let rest = self.rest();
        if rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            is_double = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.pos];
        let invalid = || ParseError::InvalidNumber {
            text: text.to_string(),
            span: Span::new(start, start + text.len()),
        };
        if is_double {
            text.parse::<f64>().map(Token::Double).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| invalid())
        }
    }

    fn escape(&mut self, quote_start: usize) -> Result<char, ParseError> {
        let escape_start = self.pos;
        let ch = self.bump().ok_or(ParseError::UnterminatedLiteral {
            span: Span::new(quote_start, self.pos),
        })?;
        let resolved = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            other => {
                return Err(ParseError::InvalidEscape {
                    ch: other,
                    span: Span::new(escape_start - 1, self.pos),
                })
            }
        };
        Ok(resolved)
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => value.push(self.escape(start)?),
                Some('\n') | None => {
                    return Err(ParseError::UnterminatedLiteral {
                        span: Span::new(start, self.pos),
                    })
                }
                Some(ch) => value.push(ch),
            }
        }
    }

    fn char_literal(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let value = match self.bump() {
            Some('\\') => self.escape(start)?,
            Some('\'') | Some('\n') | None => {
                return Err(ParseError::UnterminatedLiteral {
                    span: Span::new(start, self.pos),
                })
            }
            Some(ch) => ch,
        };
        match self.bump() {
            Some('\'') => Ok(Token::Char(value)),
            _ => Err(ParseError::UnterminatedLiteral {
                span: Span::new(start, self.pos),
            }),
        }
    }

    fn operator(&mut self) -> Result<Token, ParseError> {
        let rest = self.rest();
        for (text, token) in OPERATORS {
            if rest.starts_with(text) {
                self.pos += text.len();
                return Ok(token.clone());
            }
        }
        let start = self.pos;
        let ch = self.bump().unwrap_or('\0');
        Err(ParseError::UnexpectedCharacter {
            ch,
            span: Span::new(start, self.pos),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src).unwrap().into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn lexes_declaration() {
        assert_eq!(
            kinds("int x = 42;"),
            vec![
                Token::KwInt,
                Token::Ident("x".into()),
                Token::Assign,
                Token::Int(42),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn maximal_munch_on_operators() {
        assert_eq!(
            kinds("a <<= b++ >= c"),
            vec![
                Token::Ident("a".into()),
                Token::ShlAssign,
                Token::Ident("b".into()),
                Token::PlusPlus,
                Token::GreaterEq,
                Token::Ident("c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn doubles_need_digits_after_dot() {
        assert_eq!(kinds("1.5"), vec![Token::Double(1.5), Token::Eof]);
        assert_eq!(
            kinds("a.Length"),
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("Length".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn string_and_char_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n" '\'' 'x'"#),
            vec![
                Token::Str("a\"b\n".into()),
                Token::Char('\''),
                Token::Char('x'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("x // trailing\n/* block\n */ y"),
            vec![Token::Ident("x".into()), Token::Ident("y".into()), Token::Eof]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let src = "foo  bar";
        let tokens = lex(src).unwrap();
        assert_eq!(tokens[1].span.slice(src), Some("bar"));
        assert_eq!(tokens[2].span, Span::new(8, 8));
    }

    #[test]
    fn reports_lexical_errors() {
        assert!(matches!(lex("\"open"), Err(ParseError::UnterminatedLiteral { .. })));
        assert!(matches!(lex("/* open"), Err(ParseError::UnterminatedComment { .. })));
        assert!(matches!(lex("#"), Err(ParseError::UnexpectedCharacter { ch: '#', .. })));
        assert!(matches!(
            lex("99999999999999999999"),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert!(matches!(lex(r#""\q""#), Err(ParseError::InvalidEscape { ch: 'q', .. })));
    }
}
