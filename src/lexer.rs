//! Tokenization of command lines
//!
//! A command line is a command name followed by whitespace-separated
//! arguments. Quotes group words; a quoted run inside a word (as in
//! `--export="my file"`) is merged into the surrounding word.

use crate::error::CliError;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::{many1, separated_list0},
    sequence::{delimited, preceded, terminated},
    IResult,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LexError {
    #[error("Unterminated string in '{0}'")]
    UnterminatedString(String),
}

impl From<LexError> for CliError {
    fn from(e: LexError) -> Self {
        CliError::Parse(e.to_string())
    }
}

/// Double-quoted run with `\"` and `\\` escapes
fn double_quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\"\\"),
                '\\',
                alt((value("\"", char('"')), value("\\", char('\\')), value("$", char('$')))),
            )),
            |o| o.unwrap_or_default(),
        ),
        char('"'),
    )(input)
}

/// Single-quoted run, taken literally
fn single_quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(opt(is_not("'")), |o: Option<&str>| o.unwrap_or("").to_string()),
        char('\''),
    )(input)
}

fn bare(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != '"' && c != '\''),
        String::from,
    )(input)
}

/// A word is one or more bare or quoted runs glued together
fn word(input: &str) -> IResult<&str, String> {
    map(many1(alt((double_quoted, single_quoted, bare))), |parts| parts.concat())(input)
}

fn words(input: &str) -> IResult<&str, Vec<String>> {
    all_consuming(delimited(
        multispace0,
        separated_list0(multispace1, word),
        multispace0,
    ))(input)
}

/// Split a line into unquoted words
pub fn lex(input: &str) -> Result<Vec<String>, LexError> {
    match words(input) {
        Ok((_, tokens)) => Ok(tokens),
        Err(_) => Err(LexError::UnterminatedString(input.to_string())),
    }
}

/// The first whitespace-delimited word of a line, without full lexing.
/// Used to classify lines that are only buffered.
pub fn command_name(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Everything after the first word, untouched
pub fn rest_of_line(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(pos) => trimmed[pos..].trim(),
        None => "",
    }
}

/// A command name with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str) -> Result<Self, CliError> {
        let mut tokens = lex(line)?;
        if tokens.is_empty() {
            return Err(CliError::Parse("empty command".into()));
        }
        let name = tokens.remove(0);
        Ok(CommandLine { name, args: tokens })
    }

    /// True when `--name` appears as a bare flag
    pub fn flag(&self, name: &str) -> bool {
        self.args.iter().any(|a| a == name)
    }

    /// Value of `--name=value` or `--name value`
    pub fn option(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}=", name);
        let mut iter = self.args.iter();
        while let Some(arg) = iter.next() {
            if let Some(v) = arg.strip_prefix(&prefix) {
                return Some(v);
            }
            if arg == name {
                return iter.next().map(|s| s.as_str()).filter(|s| !s.starts_with("--"));
            }
        }
        None
    }

    /// Arguments that are neither options nor the values of `value_options`
    pub fn positionals(&self, value_options: &[&str]) -> Vec<&str> {
        let mut out = Vec::new();
        let mut skip_next = false;
        for arg in &self.args {
            if skip_next {
                skip_next = false;
                continue;
            }
            if arg.starts_with("--") {
                if value_options.contains(&arg.as_str()) {
                    skip_next = true;
                }
                continue;
            }
            out.push(arg.as_str());
        }
        out
    }
}

/// `name=value` split used by `set`; the value may itself contain `=`
pub fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// Split at the first standalone `word` that sits outside quotes and
/// brackets: `split_on_word("a == \"x of y\" of :op", "of")` gives
/// `("a == \"x of y\"", ":op")`.
pub fn split_on_word<'a>(text: &'a str, word: &str) -> Option<(&'a str, &'a str)> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == b'\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                _ if depth == 0 && bytes[i..].starts_with(word.as_bytes()) => {
                    let before_ok = i > 0 && bytes[i - 1].is_ascii_whitespace();
                    let end = i + word.len();
                    let after_ok = end == bytes.len() || bytes[end].is_ascii_whitespace();
                    if before_ok && after_ok {
                        return Some((text[..i].trim(), text[end..].trim()));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Parse an identifier: letters, digits, `_` and `-`, not starting with a digit
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        terminated(
            nom::combinator::verify(
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                |s: &str| !s.starts_with(|c: char| c.is_ascii_digit()),
            ),
            multispace0,
        ),
    )(input)
}
