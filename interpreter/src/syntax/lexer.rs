use std::ops::Range;

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    StringLit(String),
    True,
    False,
    Null,

    Ident(String),

    // Keywords
    If,
    Else,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Modulo,      // %%
    IntDivide,   // %/%
    Colon,       // :
    ColonColon,  // ::
    LeftAssign,  // <-
    RightAssign, // ->
    Eq,          // =
    EqEq,        // ==
    BangEq,      // !=
    Gt,
    Lt,
    GtEq,
    LtEq,
    Amp,      // &
    AmpAmp,   // &&
    Pipe,     // |
    PipePipe, // ||
    Bang,     // !
    Dollar,   // $
    Comma,

    // Grouping
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Statement separators
    Newline,
    Semicolon,
}

/// A token with its byte span in the fragment code.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

pub fn tokenize(code: &str) -> Result<Vec<Spanned>, RuntimeError> {
    let chars: Vec<(usize, char)> = code.char_indices().collect();
    let len = chars.len();
    let byte_at = |i: usize| chars.get(i).map(|(b, _)| *b).unwrap_or(code.len());
    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let start = i;
        let c = chars[i].1;
        let next = peek(i + 1);
        let token = match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                continue;
            }
            '\n' => {
                i += 1;
                Token::Newline
            }
            '#' => {
                while i < len && chars[i].1 != '\n' {
                    i += 1;
                }
                continue;
            }

            '"' | '\'' => {
                i += 1;
                let mut s = String::new();
                loop {
                    match peek(i) {
                        None => {
                            return Err(RuntimeError::Syntax {
                                message: "unterminated string".to_string(),
                                offset: byte_at(start),
                            });
                        }
                        Some(q) if q == c => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = peek(i + 1).ok_or_else(|| RuntimeError::Syntax {
                                message: "unterminated string".to_string(),
                                offset: byte_at(start),
                            })?;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(other) => {
                            s.push(other);
                            i += 1;
                        }
                    }
                }
                Token::StringLit(s)
            }

            '0'..='9' => lex_number(&chars, &mut i, code, byte_at(start))?,
            '.' if peek(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                lex_number(&chars, &mut i, code, byte_at(start))?
            }

            c if c.is_alphabetic() || c == '.' => {
                while i < len && is_name_char(chars[i].1) {
                    i += 1;
                }
                let ident = &code[byte_at(start)..byte_at(i)];
                match ident {
                    "TRUE" => Token::True,
                    "FALSE" => Token::False,
                    "NULL" => Token::Null,
                    "if" => Token::If,
                    "else" => Token::Else,
                    _ => Token::Ident(ident.to_string()),
                }
            }

            '`' => {
                i += 1;
                let name_start = i;
                while i < len && chars[i].1 != '`' {
                    i += 1;
                }
                if i >= len {
                    return Err(RuntimeError::Syntax {
                        message: "unterminated backquoted name".to_string(),
                        offset: byte_at(start),
                    });
                }
                let name = code[byte_at(name_start)..byte_at(i)].to_string();
                i += 1;
                Token::Ident(name)
            }

            '%' => {
                if peek(i + 1) == Some('%') {
                    i += 2;
                    Token::Modulo
                } else if peek(i + 1) == Some('/') && peek(i + 2) == Some('%') {
                    i += 3;
                    Token::IntDivide
                } else {
                    return Err(RuntimeError::Syntax {
                        message: "unknown %operator%".to_string(),
                        offset: byte_at(start),
                    });
                }
            }

            // Two-character operators
            '<' => {
                i += 1;
                match peek(i) {
                    Some('-') => {
                        i += 1;
                        Token::LeftAssign
                    }
                    Some('=') => {
                        i += 1;
                        Token::LtEq
                    }
                    _ => Token::Lt,
                }
            }
            '-' => {
                i += 1;
                if peek(i) == Some('>') {
                    i += 1;
                    Token::RightAssign
                } else {
                    Token::Minus
                }
            }
            '=' => two_char(&mut i, next, '=', Token::EqEq, Token::Eq),
            '!' => two_char(&mut i, next, '=', Token::BangEq, Token::Bang),
            '>' => two_char(&mut i, next, '=', Token::GtEq, Token::Gt),
            '&' => two_char(&mut i, next, '&', Token::AmpAmp, Token::Amp),
            '|' => two_char(&mut i, next, '|', Token::PipePipe, Token::Pipe),
            ':' => two_char(&mut i, next, ':', Token::ColonColon, Token::Colon),

            other => match single_char(other) {
                Some(token) => {
                    i += 1;
                    token
                }
                None => {
                    return Err(RuntimeError::Syntax {
                        message: format!("unexpected input '{}'", other),
                        offset: byte_at(start),
                    });
                }
            },
        };
        tokens.push(Spanned {
            token,
            span: byte_at(start)..byte_at(i),
        });
    }

    Ok(tokens)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '.' || c == '_'
}

fn single_char(c: char) -> Option<Token> {
    let token = match c {
        '+' => Token::Plus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '^' => Token::Caret,
        '$' => Token::Dollar,
        ',' => Token::Comma,
        ';' => Token::Semicolon,
        '(' => Token::LParen,
        ')' => Token::RParen,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        _ => return None,
    };
    Some(token)
}

fn two_char(i: &mut usize, next: Option<char>, second: char, pair: Token, single: Token) -> Token {
    if next == Some(second) {
        *i += 2;
        pair
    } else {
        *i += 1;
        single
    }
}

/// Digits, an optional fraction and exponent, and an optional `L` suffix.
fn lex_number(
    chars: &[(usize, char)],
    i: &mut usize,
    code: &str,
    offset: usize,
) -> Result<Token, RuntimeError> {
    let len = chars.len();
    let start = *i;
    while *i < len && (chars[*i].1.is_ascii_digit() || chars[*i].1 == '.') {
        *i += 1;
    }
    if *i < len && matches!(chars[*i].1, 'e' | 'E') {
        let mut j = *i + 1;
        if j < len && matches!(chars[j].1, '+' | '-') {
            j += 1;
        }
        if j < len && chars[j].1.is_ascii_digit() {
            while j < len && chars[j].1.is_ascii_digit() {
                j += 1;
            }
            *i = j;
        }
    }
    let end = chars.get(*i).map(|(b, _)| *b).unwrap_or(code.len());
    let text = &code[chars[start].0..end];
    if *i < len && chars[*i].1 == 'L' {
        *i += 1;
    }
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| RuntimeError::Syntax {
            message: format!("malformed number '{}'", text),
            offset,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<Token> {
        tokenize(code).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn assignment_and_call() {
        assert_eq!(
            kinds("x <- mean(c(1, 2.5))"),
            vec![
                Token::Ident("x".into()),
                Token::LeftAssign,
                Token::Ident("mean".into()),
                Token::LParen,
                Token::Ident("c".into()),
                Token::LParen,
                Token::Number(1.0),
                Token::Comma,
                Token::Number(2.5),
                Token::RParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn dotted_names_and_operators() {
        assert_eq!(
            kinds("as.numeric(x) %% 2 %/% 1e3"),
            vec![
                Token::Ident("as.numeric".into()),
                Token::LParen,
                Token::Ident("x".into()),
                Token::RParen,
                Token::Modulo,
                Token::Number(2.0),
                Token::IntDivide,
                Token::Number(1000.0),
            ]
        );
    }

    #[test]
    fn comments_and_newlines() {
        assert_eq!(
            kinds("1 # one\n2"),
            vec![Token::Number(1.0), Token::Newline, Token::Number(2.0)]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![Token::StringLit("it's".into()), Token::StringLit("a\nb".into())]
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let tokens = tokenize("ab <- 10").unwrap();
        assert_eq!(tokens[0].span, 0..2);
        assert_eq!(tokens[1].span, 3..5);
        assert_eq!(tokens[2].span, 6..8);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("x <- \"abc").unwrap_err();
        assert!(matches!(err, RuntimeError::Syntax { offset: 5, .. }));
    }
}
