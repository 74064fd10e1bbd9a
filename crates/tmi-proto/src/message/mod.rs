//! IRC message types and parsing.

mod nom_parser;
/// IRCv3 tag utilities.
pub mod tags;
mod types;

pub use self::types::IrcMessage;
