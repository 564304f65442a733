//! Tokeniser for directive expressions.

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

/// Punctuators, longest first so that matching is maximal-munch.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}",
    ",", ".", "?", ":", "!", "<", ">", "+", "-", "*", "/", "%",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let (number, next) = read_number(&chars, i, source)?;
            tokens.push(Token::Number(number));
            i = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = read_string(&chars, i, source)?;
            tokens.push(Token::Str(text));
            i = next;
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        let punct = PUNCTUATORS.iter().find(|p| {
            let len = p.chars().count();
            i + len <= chars.len() && p.chars().eq(chars[i..i + len].iter().copied())
        });
        match punct {
            // `a?.5:1` is a conditional, not optional chaining.
            Some(&"?.") if chars.get(i + 2).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Punct("?"));
                i += 1;
            }
            Some(p) => {
                tokens.push(Token::Punct(p));
                i += p.len();
            }
            None => {
                return Err(EvalError::Syntax {
                    expression: source.to_string(),
                    message: format!("unexpected character `{c}`"),
                });
            }
        }
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn read_number(chars: &[char], start: usize, source: &str) -> Result<(f64, usize), EvalError> {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| EvalError::Syntax {
            expression: source.to_string(),
            message: format!("invalid number `{text}`"),
        })
}

fn read_string(chars: &[char], start: usize, source: &str) -> Result<(String, usize), EvalError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((text, i + 1)),
            '\\' => {
                i += 1;
                let Some(&escaped) = chars.get(i) else { break };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    'u' => {
                        let hex: String = chars.iter().skip(i + 1).take(4).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(c) if hex.len() == 4 => {
                                text.push(c);
                                i += 4;
                            }
                            _ => text.push('u'),
                        }
                    }
                    other => text.push(other),
                }
            }
            c => text.push(c),
        }
        i += 1;
    }

    Err(EvalError::Syntax {
        expression: source.to_string(),
        message: "unterminated string literal".to_string(),
    })
}
