//! Tokenizer for stackvm assembly text.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A mnemonic, function name, or label reference.
    Ident(String),
    /// A directive such as `.int`, stored lowercase without the dot.
    Directive(String),
    /// A label definition, stored without the trailing colon.
    Label(String),
    /// A numeric literal (decimal or hex, optionally signed).
    Number(i64),
    /// A string literal with escapes resolved.
    Str(Vec<u8>),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s}"),
            Token::Directive(s) => write!(f, ".{s}"),
            Token::Label(s) => write!(f, "{s}:"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Tokenize a single line of assembly text.
///
/// Returns an empty Vec for blank lines and comment-only lines.
/// Comments start with `;` outside a string literal and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(string_literal(&mut chars, line_num)?));
            }
            _ => {
                let mut end = line.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == ';' || c == '"' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(word(&line[start..end], line_num)?);
            }
        }
    }

    Ok(tokens)
}

/// Classify a whitespace-delimited word.
fn word(text: &str, line_num: usize) -> Result<Token, AsmError> {
    let unexpected = || AsmError::UnexpectedToken {
        line: line_num,
        token: text.to_string(),
    };

    if let Some(name) = text.strip_prefix('.') {
        if !is_identifier(name) {
            return Err(unexpected());
        }
        return Ok(Token::Directive(name.to_lowercase()));
    }
    if let Some(name) = text.strip_suffix(':') {
        if !is_identifier(name) {
            return Err(unexpected());
        }
        return Ok(Token::Label(name.to_string()));
    }

    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        return number(text, line_num).map(Token::Number);
    }
    if is_identifier(text) {
        return Ok(Token::Ident(text.to_string()));
    }
    Err(unexpected())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Parse a decimal or `0x` hexadecimal literal with an optional sign.
fn number(text: &str, line_num: usize) -> Result<i64, AsmError> {
    let invalid = || AsmError::InvalidNumber {
        line: line_num,
        token: text.to_string(),
    };
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Read a string literal body; the opening quote is already consumed.
fn string_literal(
    chars: &mut Peekable<CharIndices<'_>>,
    line_num: usize,
) -> Result<Vec<u8>, AsmError> {
    let mut bytes = Vec::new();
    loop {
        let (_, c) = chars
            .next()
            .ok_or(AsmError::UnterminatedString { line: line_num })?;
        match c {
            '"' => return Ok(bytes),
            '\\' => {
                let (_, e) = chars
                    .next()
                    .ok_or(AsmError::UnterminatedString { line: line_num })?;
                match e {
                    'n' => bytes.push(b'\n'),
                    't' => bytes.push(b'\t'),
                    'r' => bytes.push(b'\r'),
                    '\\' => bytes.push(b'\\'),
                    '"' => bytes.push(b'"'),
                    'x' => {
                        let hi = chars.next().map(|(_, c)| c);
                        let lo = chars.next().map(|(_, c)| c);
                        let byte = match (hi, lo) {
                            (Some(hi), Some(lo)) => hi
                                .to_digit(16)
                                .zip(lo.to_digit(16))
                                .map(|(hi, lo)| (hi * 16 + lo) as u8),
                            _ => None,
                        };
                        bytes.push(byte.ok_or_else(|| AsmError::InvalidEscape {
                            line: line_num,
                            escape: format!(
                                "\\x{}{}",
                                hi.map(String::from).unwrap_or_default(),
                                lo.map(String::from).unwrap_or_default()
                            ),
                        })?);
                    }
                    other => {
                        return Err(AsmError::InvalidEscape {
                            line: line_num,
                            escape: format!("\\{other}"),
                        })
                    }
                }
            }
            c => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
