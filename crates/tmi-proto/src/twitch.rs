//! Typed Twitch message variants.
//!
//! [`TwitchMessage`] is a closed enum over the message kinds the history
//! service stores and exports. Each variant wraps the parsed [`IrcMessage`]
//! and exposes the Twitch-specific fields read from its tags and parameters.

use std::time::Duration;

use crate::channel::channel_from_param;
use crate::error::ProtocolError;
use crate::message::IrcMessage;

/// Discriminant of a [`TwitchMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `PRIVMSG`
    Privmsg,
    /// `CLEARCHAT`
    Clearchat,
    /// `CLEARMSG`
    Clearmsg,
    /// `USERNOTICE`
    Usernotice,
    /// `NOTICE`
    Notice,
    /// `ROOMSTATE`
    Roomstate,
    /// Anything else.
    Other,
}

/// A classified TMI message.
#[derive(Clone, Debug, PartialEq)]
pub enum TwitchMessage {
    /// Regular chat message.
    Privmsg(PrivmsgMessage),
    /// Chat clear, timeout or permanent ban.
    Clearchat(ClearchatMessage),
    /// Single message deletion.
    Clearmsg(ClearmsgMessage),
    /// Subscription, raid and similar user events.
    Usernotice(UsernoticeMessage),
    /// Server notice.
    Notice(NoticeMessage),
    /// Channel settings update.
    Roomstate(RoomstateMessage),
    /// Any other command.
    Other(IrcMessage),
}

impl TwitchMessage {
    /// Parse and classify a raw wire line.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Self::from_irc(IrcMessage::parse(raw)?)
    }

    /// Classify an already parsed line.
    pub fn from_irc(irc: IrcMessage) -> Result<Self, ProtocolError> {
        Ok(match irc.command() {
            "PRIVMSG" => TwitchMessage::Privmsg(PrivmsgMessage::new(irc)?),
            "CLEARCHAT" => TwitchMessage::Clearchat(ClearchatMessage::new(irc)?),
            "CLEARMSG" => TwitchMessage::Clearmsg(ClearmsgMessage::new(irc)?),
            "USERNOTICE" => TwitchMessage::Usernotice(UsernoticeMessage::new(irc)?),
            "NOTICE" => TwitchMessage::Notice(NoticeMessage::new(irc)),
            "ROOMSTATE" => TwitchMessage::Roomstate(RoomstateMessage::new(irc)?),
            _ => TwitchMessage::Other(irc),
        })
    }

    /// Variant discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            TwitchMessage::Privmsg(_) => MessageKind::Privmsg,
            TwitchMessage::Clearchat(_) => MessageKind::Clearchat,
            TwitchMessage::Clearmsg(_) => MessageKind::Clearmsg,
            TwitchMessage::Usernotice(_) => MessageKind::Usernotice,
            TwitchMessage::Notice(_) => MessageKind::Notice,
            TwitchMessage::Roomstate(_) => MessageKind::Roomstate,
            TwitchMessage::Other(_) => MessageKind::Other,
        }
    }

    /// Underlying parsed line.
    pub fn irc(&self) -> &IrcMessage {
        match self {
            TwitchMessage::Privmsg(m) => &m.irc,
            TwitchMessage::Clearchat(m) => &m.irc,
            TwitchMessage::Clearmsg(m) => &m.irc,
            TwitchMessage::Usernotice(m) => &m.irc,
            TwitchMessage::Notice(m) => &m.irc,
            TwitchMessage::Roomstate(m) => &m.irc,
            TwitchMessage::Other(irc) => irc,
        }
    }

    /// Raw wire line.
    pub fn raw(&self) -> &str {
        self.irc().raw()
    }

    /// Channel the message belongs to, for channel-scoped messages.
    ///
    /// For [`TwitchMessage::Other`] the first parameter is used when it looks
    /// like a channel, which covers `JOIN`, `PART`, `USERSTATE` and `HOSTTARGET`.
    pub fn channel_name(&self) -> Option<&str> {
        match self {
            TwitchMessage::Privmsg(m) => Some(m.channel_name()),
            TwitchMessage::Clearchat(m) => Some(m.channel_name()),
            TwitchMessage::Clearmsg(m) => Some(m.channel_name()),
            TwitchMessage::Usernotice(m) => Some(m.channel_name()),
            TwitchMessage::Notice(m) => m.channel_name(),
            TwitchMessage::Roomstate(m) => Some(m.channel_name()),
            TwitchMessage::Other(irc) => irc.param(0).and_then(channel_from_param),
        }
    }
}

fn required_channel(irc: &IrcMessage, command: &'static str) -> Result<String, ProtocolError> {
    irc.param(0)
        .and_then(channel_from_param)
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::MissingParameter {
            command,
            index: 0,
            raw: irc.raw().to_owned(),
        })
}

fn required_param(
    irc: &IrcMessage,
    command: &'static str,
    index: usize,
) -> Result<String, ProtocolError> {
    irc.param(index)
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::MissingParameter {
            command,
            index,
            raw: irc.raw().to_owned(),
        })
}

/// `PRIVMSG #channel :text`
#[derive(Clone, Debug, PartialEq)]
pub struct PrivmsgMessage {
    irc: IrcMessage,
    channel_name: String,
    message_text: String,
}

impl PrivmsgMessage {
    fn new(irc: IrcMessage) -> Result<Self, ProtocolError> {
        let channel_name = required_channel(&irc, "PRIVMSG")?;
        let message_text = required_param(&irc, "PRIVMSG", 1)?;
        Ok(Self {
            irc,
            channel_name,
            message_text,
        })
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Chat text.
    pub fn message_text(&self) -> &str {
        &self.message_text
    }

    /// Sender login: the prefix nickname, falling back to the `login` tag.
    pub fn sender_username(&self) -> &str {
        self.irc
            .source_nickname()
            .or_else(|| self.irc.tag_value("login"))
            .unwrap_or("")
    }

    /// Message id from the `id` tag.
    pub fn message_id(&self) -> Option<&str> {
        self.irc.tag_value("id")
    }
}

/// What a `CLEARCHAT` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClearchatAction {
    /// Entire chat history cleared.
    ChatCleared,
    /// User timed out for a duration.
    Timeout {
        /// Target login.
        target_username: String,
        /// Timeout length.
        duration: Duration,
    },
    /// User permanently banned.
    Permaban {
        /// Target login.
        target_username: String,
    },
}

/// `CLEARCHAT #channel [:target]`
#[derive(Clone, Debug, PartialEq)]
pub struct ClearchatMessage {
    irc: IrcMessage,
    channel_name: String,
    target_username: Option<String>,
    ban_duration: Option<Duration>,
}

impl ClearchatMessage {
    fn new(irc: IrcMessage) -> Result<Self, ProtocolError> {
        let channel_name = required_channel(&irc, "CLEARCHAT")?;
        let target_username = irc.param(1).filter(|t| !t.is_empty()).map(str::to_owned);
        let ban_duration = match irc.tag_value("ban-duration").filter(|v| !v.is_empty()) {
            Some(value) => Some(Duration::from_secs(value.parse().map_err(|_| {
                ProtocolError::InvalidTagValue {
                    tag: "ban-duration",
                    value: value.to_owned(),
                    raw: irc.raw().to_owned(),
                }
            })?)),
            None => None,
        };
        Ok(Self {
            irc,
            channel_name,
            target_username,
            ban_duration,
        })
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Target login, absent for a full clear.
    pub fn target_username(&self) -> Option<&str> {
        self.target_username.as_deref()
    }

    /// Timeout length from the `ban-duration` tag.
    pub fn ban_duration(&self) -> Option<Duration> {
        self.ban_duration
    }

    /// Classify the clear.
    ///
    /// Returns `None` for the inconsistent shape of a duration without a
    /// target user.
    pub fn action(&self) -> Option<ClearchatAction> {
        match (&self.target_username, self.ban_duration) {
            (None, None) => Some(ClearchatAction::ChatCleared),
            (Some(target), Some(duration)) => Some(ClearchatAction::Timeout {
                target_username: target.clone(),
                duration,
            }),
            (Some(target), None) => Some(ClearchatAction::Permaban {
                target_username: target.clone(),
            }),
            (None, Some(_)) => None,
        }
    }
}

/// `CLEARMSG #channel :text`
#[derive(Clone, Debug, PartialEq)]
pub struct ClearmsgMessage {
    irc: IrcMessage,
    channel_name: String,
    target_message_id: String,
}

impl ClearmsgMessage {
    fn new(irc: IrcMessage) -> Result<Self, ProtocolError> {
        let channel_name = required_channel(&irc, "CLEARMSG")?;
        let target_message_id = irc
            .tag_value("target-msg-id")
            .map(str::to_owned)
            .ok_or_else(|| ProtocolError::InvalidTagValue {
                tag: "target-msg-id",
                value: String::new(),
                raw: irc.raw().to_owned(),
            })?;
        Ok(Self {
            irc,
            channel_name,
            target_message_id,
        })
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Id of the deleted message.
    pub fn target_message_id(&self) -> &str {
        &self.target_message_id
    }

    /// Login of the deleted message's author.
    pub fn target_username(&self) -> Option<&str> {
        self.irc.tag_value("login")
    }
}

/// `USERNOTICE #channel [:text]`
#[derive(Clone, Debug, PartialEq)]
pub struct UsernoticeMessage {
    irc: IrcMessage,
    channel_name: String,
}

impl UsernoticeMessage {
    fn new(irc: IrcMessage) -> Result<Self, ProtocolError> {
        let channel_name = required_channel(&irc, "USERNOTICE")?;
        Ok(Self { irc, channel_name })
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// The user's own attached text, if any was sent.
    pub fn message_text(&self) -> Option<&str> {
        self.irc.param(1)
    }

    /// Server-generated narration from the `system-msg` tag.
    pub fn system_message(&self) -> &str {
        self.irc.tag_or_empty("system-msg")
    }

    /// Sender login from the `login` tag.
    pub fn sender_username(&self) -> &str {
        self.irc.tag_or_empty("login")
    }

    /// Message id from the `id` tag.
    pub fn message_id(&self) -> Option<&str> {
        self.irc.tag_value("id")
    }

    /// Notice type from the `msg-id` tag (`sub`, `raid`, ...).
    pub fn notice_type(&self) -> Option<&str> {
        self.irc.tag_value("msg-id")
    }
}

/// `NOTICE <#channel|*> :text`
#[derive(Clone, Debug, PartialEq)]
pub struct NoticeMessage {
    irc: IrcMessage,
}

impl NoticeMessage {
    fn new(irc: IrcMessage) -> Self {
        Self { irc }
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`. Global notices have none.
    pub fn channel_name(&self) -> Option<&str> {
        self.irc.param(0).and_then(channel_from_param)
    }

    /// Notice text.
    pub fn message_text(&self) -> &str {
        self.irc.param(1).unwrap_or("")
    }

    /// Notice id from the `msg-id` tag.
    pub fn message_id(&self) -> Option<&str> {
        self.irc.tag_value("msg-id")
    }
}

/// `ROOMSTATE #channel`
#[derive(Clone, Debug, PartialEq)]
pub struct RoomstateMessage {
    irc: IrcMessage,
    channel_name: String,
}

impl RoomstateMessage {
    fn new(irc: IrcMessage) -> Result<Self, ProtocolError> {
        let channel_name = required_channel(&irc, "ROOMSTATE")?;
        Ok(Self { irc, channel_name })
    }

    /// Underlying line.
    pub fn irc(&self) -> &IrcMessage {
        &self.irc
    }

    /// Channel, without `#`.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }
}
