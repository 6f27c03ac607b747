//! Nom-based line parser.
//!
//! Zero-copy split of a raw line into its tags, source, command and
//! parameters; [`super::Line`] turns the result into owned data.

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::LineParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        preceded(char('@'), take_till1(|c: char| c == ' ')),
    )(input)
}

/// Parse the source prefix (the part after `:` and before the first space).
fn parse_source(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing source prefix",
        preceded(char(':'), take_till1(|c: char| c == ' ')),
    )(input)
}

/// Parse the command name or numeric.
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing command",
        take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

/// Parse the parameter list following the command.
///
/// Runs of spaces separate parameters; a parameter starting with `:`
/// swallows the rest of the line.
fn parse_params(input: &str) -> (&str, Vec<&str>) {
    let mut params = Vec::new();
    let mut rest = input;

    loop {
        let trimmed = rest.trim_start_matches(' ');
        if trimmed.is_empty() || trimmed.len() == rest.len() {
            break;
        }
        rest = trimmed;

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_line(input: &str) -> ParseResult<&str, ParsedLine<'_>> {
    let (input, tags) = context("parsing optional tags", opt(parse_tags))(input)?;
    let (input, _) = space0(input)?;

    let (input, source) = context("parsing optional source", opt(parse_source))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = context("parsing required command", parse_command)(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedLine {
            tags,
            source,
            command,
            params,
        },
    ))
}

/// A parsed line borrowing from its input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedLine<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw source (without the leading `:`), if present.
    pub source: Option<&'a str>,
    /// The command name as sent.
    pub command: &'a str,
    /// Parameters, trailing included.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedLine<'a> {
    pub fn parse(input: &'a str) -> Result<Self, LineParseError> {
        match parse_line(input) {
            Ok((_rest, line)) => Ok(line),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut position = input.len();
                let mut ctx = "parsing line";
                for (error_input, kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let VerboseErrorKind::Context(c) = kind {
                        ctx = c;
                    }
                }
                Err(LineParseError::Malformed {
                    position,
                    context: ctx,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(LineParseError::Malformed {
                position: input.len(),
                context: "incomplete input",
            }),
        }
    }
}
