//! # tmi-proto
//!
//! Parsing and formatting of Twitch IRC ("TMI") protocol lines.
//!
//! ## Features
//!
//! - IRC line parsing with IRCv3 tags, prefixes, commands and parameters
//! - A closed [`TwitchMessage`] variant for the message kinds the chat
//!   history service cares about (`PRIVMSG`, `CLEARCHAT`, `CLEARMSG`,
//!   `USERNOTICE`, `NOTICE`, `ROOMSTATE`), with everything else kept as
//!   [`TwitchMessage::Other`]
//! - Tag merging on raw lines that never re-serializes the message body
//! - Optional Tokio line codec
//!
//! ## Parsing
//!
//! ```rust
//! use tmi_proto::TwitchMessage;
//!
//! let raw = "@id=abc;login=alice :alice!alice@alice.tmi.twitch.tv PRIVMSG #forsen :hi";
//! match TwitchMessage::parse(raw).unwrap() {
//!     TwitchMessage::Privmsg(msg) => assert_eq!(msg.sender_username(), "alice"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! ## Merging tags
//!
//! ```rust
//! use tmi_proto::{merge_tags, TagMap};
//!
//! let mut extra = TagMap::new();
//! extra.insert("historical", Some("1"));
//! let merged = merge_tags("@id=abc PRIVMSG #forsen :hi", &extra);
//! assert_eq!(merged, "@historical=1;id=abc PRIVMSG #forsen :hi");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod channel;
#[cfg(feature = "tokio")]
pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod prefix;
pub mod twitch;

pub use self::channel::{channel_from_param, validate_channel_name};
#[cfg(feature = "tokio")]
pub use self::codec::TmiCodec;
pub use self::error::{MessageParseError, ProtocolError};
pub use self::message::tags::{merge_tags, Tag, TagMap};
pub use self::message::IrcMessage;
pub use self::prefix::Prefix;
pub use self::twitch::{
    ClearchatAction, ClearchatMessage, ClearmsgMessage, MessageKind, NoticeMessage,
    PrivmsgMessage, RoomstateMessage, TwitchMessage, UsernoticeMessage,
};
