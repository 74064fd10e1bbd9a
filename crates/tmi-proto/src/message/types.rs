use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

use super::nom_parser::ParsedLine;
use super::tags::{parse_tag_block, Tag};

/// A parsed IRC line that keeps its raw source.
///
/// The raw source is what gets stored and re-exported; the parsed parts are
/// only used to classify and inspect the line.
///
/// # Example
///
/// ```
/// use tmi_proto::IrcMessage;
///
/// let msg = IrcMessage::parse("@id=1 :tmi.twitch.tv ROOMSTATE #forsen").unwrap();
/// assert_eq!(msg.command(), "ROOMSTATE");
/// assert_eq!(msg.tag_value("id"), Some("1"));
/// assert_eq!(msg.param(0), Some("#forsen"));
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct IrcMessage {
    raw: String,
    tags: Vec<Tag>,
    prefix: Option<Prefix>,
    command: String,
    params: Vec<String>,
}

impl IrcMessage {
    /// Parse a raw wire line. Trailing CR/LF is stripped from the kept source.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if raw.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: raw.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let line = ParsedLine::parse(raw).map_err(|(position, kind)| {
            ProtocolError::InvalidMessage {
                string: raw.to_owned(),
                cause: MessageParseError::ParseContext {
                    position,
                    context: format!("{kind:?}"),
                },
            }
        })?;

        Ok(IrcMessage {
            raw: raw.to_owned(),
            tags: line.tags.map(parse_tag_block).unwrap_or_default(),
            prefix: line.prefix.map(Prefix::new_from_str),
            command: line.command.to_ascii_uppercase(),
            params: line.params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// The raw wire line as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Upper-cased command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Message source, if any.
    pub fn prefix(&self) -> Option<&Prefix> {
        self.prefix.as_ref()
    }

    /// All parameters, trailing included.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// All tags in wire order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether a tag with `key` is present, with or without value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.iter().any(|Tag(k, _)| k == key)
    }

    /// Value of a tag by key. Value-less tags yield `None`.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// Value of a tag, or the empty string when absent.
    pub fn tag_or_empty(&self, key: &str) -> &str {
        self.tag_value(key).unwrap_or("")
    }

    /// Nickname from the prefix, if the source is a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }
}

impl FromStr for IrcMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IrcMessage::parse(s)
    }
}

impl Display for IrcMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
