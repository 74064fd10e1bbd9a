//! Nom-based line splitter.
//!
//! Splits a raw line into borrowed tag block, prefix, command and parameter
//! slices. Typed interpretation happens in [`crate::twitch`].

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};

/// Tag block: everything after `@` up to the first space.
fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Source prefix: everything after `:` up to the first space.
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Command name, either letters only or a three digit numeric.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Middle parameters plus the optional trailing one.
///
/// Consecutive spaces collapse into one separator. The trailing parameter
/// (introduced by `:`) runs to the end of the line and may be empty.
fn parse_params(input: &str) -> (&str, Vec<&str>) {
    let mut params = Vec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = rest.trim_start_matches(' ');

        if rest.is_empty() || rest.starts_with(['\r', '\n']) {
            break;
        }

        if let Some(after_colon) = rest.strip_prefix(':') {
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_line(input: &str) -> IResult<&str, ParsedLine<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedLine {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A split IRC line holding slices of the original input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedLine<'a> {
    /// Raw tag block without the leading `@`.
    pub tags: Option<&'a str>,
    /// Raw prefix without the leading `:`.
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl<'a> ParsedLine<'a> {
    /// Split `input`, returning the byte position of the failure on error.
    pub fn parse(input: &'a str) -> Result<Self, (usize, ErrorKind)> {
        match parse_line(input) {
            Ok((_rest, line)) => Ok(line),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err((input.len() - e.input.len(), e.code))
            }
            Err(nom::Err::Incomplete(_)) => Err((input.len(), ErrorKind::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let line = ParsedLine::parse("PING").unwrap();
        assert_eq!(line.command, "PING");
        assert!(line.tags.is_none());
        assert!(line.prefix.is_none());
        assert!(line.params.is_empty());
    }

    #[test]
    fn test_parse_twitch_privmsg() {
        let line = ParsedLine::parse(
            "@badge-info=;color=#FF0000;id=abc :alice!alice@alice.tmi.twitch.tv PRIVMSG #forsen :hello there",
        )
        .unwrap();
        assert_eq!(line.tags, Some("badge-info=;color=#FF0000;id=abc"));
        assert_eq!(line.prefix, Some("alice!alice@alice.tmi.twitch.tv"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#forsen", "hello there"]);
    }

    #[test]
    fn test_parse_clearchat_without_trailing() {
        let line = ParsedLine::parse("@room-id=1 :tmi.twitch.tv CLEARCHAT #forsen").unwrap();
        assert_eq!(line.command, "CLEARCHAT");
        assert_eq!(line.params, vec!["#forsen"]);
    }

    #[test]
    fn test_parse_strips_crlf() {
        let line = ParsedLine::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(line.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let line = ParsedLine::parse("PRIVMSG #forsen :").unwrap();
        assert_eq!(line.params, vec!["#forsen", ""]);
    }

    #[test]
    fn test_parse_numeric() {
        let line = ParsedLine::parse(":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!").unwrap();
        assert_eq!(line.command, "001");
    }

    #[test]
    fn test_parse_rejects_bad_command() {
        assert!(ParsedLine::parse("PING123").is_err());
        assert!(ParsedLine::parse("12").is_err());
        assert!(ParsedLine::parse(":prefix-only").is_err());
    }
}
