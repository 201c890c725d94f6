//! Lexer/tokenizer for filter text.

use winnow::ascii::space0;
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// Token types for filter text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Identifiers and literals
    Ident(String),  // column name, operator name, custom name, true/false
    Number(String), // numeric literal, raw text kept so `02` stays `02`
    Str(String),    // quoted string, escapes resolved

    // Comparison shorthands
    Eq, // = or ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Boolean operators
    And, // & or &&
    Or,  // | or ||
    Not, // !

    // Punctuation
    LParen, // (
    RParen, // )

    // End of input
    Eof,
}

type PResult<T> = Result<T, ErrMode<ContextError>>;

fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// Lex an identifier: a letter or underscore, then letters, digits, underscores.
fn lex_ident(input: &mut &str) -> PResult<Token> {
    let first = take_while(1, |c: char| c.is_alphabetic() || c == '_').parse_next(input)?;
    let rest = take_while(0.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)?;
    Ok(Token::Ident(format!("{first}{rest}")))
}

/// Lex a number (integer or decimal, optionally negative).
fn lex_number(input: &mut &str) -> PResult<Token> {
    let neg = opt('-').parse_next(input)?;
    let digits = take_while(1.., |c: char| c.is_ascii_digit() || c == '.').parse_next(input)?;
    let raw = if neg.is_some() {
        format!("-{digits}")
    } else {
        digits.to_string()
    };
    if raw.parse::<f64>().is_err() {
        return backtrack();
    }
    Ok(Token::Number(raw))
}

/// Lex a single- or double-quoted string.
///
/// `\\` and an escaped quote are unescaped; any other backslash sequence is kept
/// verbatim so regex classes like `\d` survive.
fn lex_string(input: &mut &str) -> PResult<Token> {
    let source = *input;
    let quote = match source.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return backtrack(),
    };

    let body = &source[1..];
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            *input = &body[i + 1..];
            return Ok(Token::Str(out));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, escaped)) if escaped == quote || escaped == '\\' => out.push(escaped),
            Some((_, other)) => {
                out.push('\\');
                out.push(other);
            }
            None => break,
        }
    }

    // Unterminated string: no alternative can recover
    Err(ErrMode::Cut(ContextError::new()))
}

/// Lex a single token.
fn lex_token(input: &mut &str) -> PResult<Token> {
    space0.parse_next(input)?;

    if input.is_empty() {
        return Ok(Token::Eof);
    }

    alt((
        // Multi-char operators first
        "!=".value(Token::Ne),
        "==".value(Token::Eq),
        "<=".value(Token::Le),
        ">=".value(Token::Ge),
        "&&".value(Token::And),
        "||".value(Token::Or),
        // Single-char operators
        "=".value(Token::Eq),
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "&".value(Token::And),
        "|".value(Token::Or),
        "!".value(Token::Not),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        lex_string,
        lex_number,
        lex_ident,
    ))
    .parse_next(input)
}

/// Tokenize the entire input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        match lex_token(&mut remaining) {
            Ok(Token::Eof) => break,
            Ok(tok) => tokens.push(tok),
            Err(ErrMode::Cut(_)) => {
                return Err(format!("unterminated string at '{}'", remaining.trim_start()));
            }
            Err(_) => return Err(format!("unexpected input at '{}'", remaining.trim_start())),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}
