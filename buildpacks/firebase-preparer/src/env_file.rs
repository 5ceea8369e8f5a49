//! Dotenv style files: `KEY=value` lines with `#` comments.
//!
//! Values may be double quoted, with `\n`, `\"` and `\\` escapes, or single quoted, taken
//! literally. Quoted values can span several lines.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) type EnvVars = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("line {line} is not a KEY=VALUE assignment")]
    InvalidLine { line: usize },

    #[error("{key:?} on line {line} is not a valid variable name")]
    InvalidKey { line: usize, key: String },

    #[error("the quoted value starting on line {line} is never closed")]
    UnterminatedQuote { line: usize },
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum EnvFileError {
    #[error("Couldn't read {path}: {1}", path = .0.display())]
    Read(PathBuf, io::Error),

    #[error("Invalid {path}: {1}", path = .0.display())]
    Parse(PathBuf, ParseError),

    #[error("Couldn't write {path}: {1}", path = .0.display())]
    Write(PathBuf, io::Error),
}

/// Reads an env file. A file that doesn't exist has no variables.
pub(crate) fn read(path: &Path) -> Result<EnvVars, EnvFileError> {
    match fs::read_to_string(path) {
        Ok(contents) => parse(&contents).map_err(|error| EnvFileError::Parse(path.into(), error)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(EnvVars::new()),
        Err(error) => Err(EnvFileError::Read(path.into(), error)),
    }
}

pub(crate) fn write(path: &Path, vars: &EnvVars) -> Result<(), EnvFileError> {
    fs::write(path, render(vars)).map_err(|error| EnvFileError::Write(path.into(), error))
}

pub(crate) fn parse(contents: &str) -> Result<EnvVars, ParseError> {
    let mut vars = EnvVars::new();
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line));

    while let Some((line_number, line)) = lines.next() {
        let line = line.trim_start();
        if line.trim_end().is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, raw_value) = line
            .split_once('=')
            .ok_or(ParseError::InvalidLine { line: line_number })?;

        let key = key.trim();
        if !is_valid_key(key) {
            return Err(ParseError::InvalidKey {
                line: line_number,
                key: key.to_string(),
            });
        }

        let raw_value = raw_value.trim_start();
        let value = match raw_value.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                quoted_value(&raw_value[1..], quote, line_number, &mut lines)?
            }
            _ => unquoted_value(raw_value),
        };

        vars.insert(key.to_string(), value);
    }

    Ok(vars)
}

/// Renders variables so that [`parse`] reads back the same values.
pub(crate) fn render(vars: &EnvVars) -> String {
    vars.iter()
        .map(|(key, value)| format!("{key}=\"{}\"\n", escape(value)))
        .collect()
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquoted_value(raw: &str) -> String {
    raw.split_once(" #")
        .map_or(raw, |(value, _)| value)
        .trim()
        .to_string()
}

// Consumes further lines until the closing quote.
fn quoted_value<'a>(
    first_line: &'a str,
    quote: char,
    start_line: usize,
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
) -> Result<String, ParseError> {
    let mut value = String::new();
    let mut current = (start_line, first_line);

    loop {
        let (line_number, rest) = current;
        let mut chars = rest.char_indices();

        while let Some((index, c)) = chars.next() {
            match c {
                '\\' if quote == '"' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, escaped @ ('"' | '\\'))) => value.push(escaped),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => value.push('\\'),
                },
                c if c == quote => {
                    let trailing = rest[index + c.len_utf8()..].trim();
                    return if trailing.is_empty() || trailing.starts_with('#') {
                        Ok(value)
                    } else {
                        Err(ParseError::InvalidLine { line: line_number })
                    };
                }
                c => value.push(c),
            }
        }

        current = lines
            .next()
            .ok_or(ParseError::UnterminatedQuote { line: start_line })?;
        value.push('\n');
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
