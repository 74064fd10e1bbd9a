//! IRC message prefix.
//!
//! TMI sends either the bare server name (`tmi.twitch.tv`) or a full
//! `nick!user@host` mask.

use std::fmt;

/// Origin of a message.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// Server name (e.g. `tmi.twitch.tv`).
    ServerName(String),
    /// User prefix: (nickname, username, hostname).
    Nickname(String, String, String),
}

impl Prefix {
    /// Leniently parse a prefix string.
    ///
    /// A dot before any `!`/`@` marks a server name.
    pub fn new_from_str(s: &str) -> Self {
        let (name, user, host) = match s.split_once('!') {
            Some((nick, rest)) => match rest.split_once('@') {
                Some((user, host)) => (nick, user, host),
                None => (nick, rest, ""),
            },
            None => match s.split_once('@') {
                Some((nick, host)) => (nick, "", host),
                None => (s, "", ""),
            },
        };

        if user.is_empty() && host.is_empty() && name.contains('.') {
            Prefix::ServerName(name.to_owned())
        } else {
            Prefix::Nickname(name.to_owned(), user.to_owned(), host.to_owned())
        }
    }

    /// Nickname, if this is a non-empty user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}
