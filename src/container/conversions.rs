//! Synthesized replacement lines.
//!
//! Consumers that only understand `PRIVMSG` get moderation events, notices and
//! user notices rewritten as chat messages from fixed pseudo users. Generated
//! message ids are name-based UUIDs of the source line, so exporting the same
//! log twice yields identical output.

use super::ContainerError;
use std::fmt::Write;
use std::time::Duration;
use tmi_proto::message::tags::escape_tag_value;
use tmi_proto::{
    ClearchatAction, ClearchatMessage, IrcMessage, NoticeMessage, TwitchMessage, UsernoticeMessage,
};
use uuid::Uuid;

const PSEUDO_USER_COLOR: &str = "#613FA0";
const NOTICE_USER_ID: &str = "1335710";
const USERNOTICE_USER_ID: &str = "425963448";

/// A synthesized chat line from a pseudo user such as `NOTICE`.
struct PseudoPrivmsg<'a> {
    display_name: &'a str,
    login: &'a str,
    user_id: &'a str,
    room_id: &'a str,
    sent_ts: String,
    id: Uuid,
    channel: &'a str,
    text: &'a str,
}

impl PseudoPrivmsg<'_> {
    fn render(&self) -> String {
        format!(
            "@badge-info=;badges=twitchbot/1;color={color};display-name={display_name};emotes=;flags=;id={id};mod=0;room-id={room_id};subscriber=0;tmi-sent-ts={sent_ts};turbo=0;user-id={user_id};user-type= :{login}!{login}@{login}.tmi.twitch.tv PRIVMSG #{channel} :{text}",
            color = PSEUDO_USER_COLOR,
            display_name = self.display_name,
            id = self.id,
            room_id = escape_tag_value(self.room_id),
            sent_ts = escape_tag_value(&self.sent_ts),
            user_id = self.user_id,
            login = self.login,
            channel = self.channel,
            text = single_line(self.text),
        )
    }
}

/// Derive a stable id for the `n`th line synthesized from `source`.
fn synthesized_id(source: &IrcMessage, n: u8) -> Uuid {
    let mut name = Vec::with_capacity(source.raw().len() + 1);
    name.extend_from_slice(source.raw().as_bytes());
    name.push(n);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &name)
}

/// Trailing parameters cannot carry line breaks.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn sent_ts(source: &IrcMessage, create_time: i64) -> String {
    source
        .tag_value("tmi-sent-ts")
        .map(str::to_owned)
        .unwrap_or_else(|| create_time.to_string())
}

fn parse(line: String) -> Result<TwitchMessage, ContainerError> {
    Ok(TwitchMessage::parse(&line)?)
}

/// Classify a `CLEARCHAT`, failing on the inconsistent shapes.
pub(crate) fn clearchat_action(msg: &ClearchatMessage) -> Result<ClearchatAction, ContainerError> {
    msg.action().ok_or_else(|| ContainerError::MalformedClearchat {
        raw: msg.irc().raw().to_owned(),
    })
}

/// Human-readable narration of a `CLEARCHAT`.
pub(crate) fn clearchat_text(action: &ClearchatAction) -> String {
    match action {
        ClearchatAction::ChatCleared => "Chat has been cleared by a moderator.".to_string(),
        ClearchatAction::Timeout {
            target_username,
            duration,
        } => format!(
            "{} has been timed out for {}.",
            target_username,
            format_duration(*duration)
        ),
        ClearchatAction::Permaban { target_username } => {
            format!("{} has been permanently banned.", target_username)
        }
    }
}

/// `msg-id` used when a `CLEARCHAT` is rewritten as a `NOTICE`.
fn clearchat_notice_id(action: &ClearchatAction) -> &'static str {
    match action {
        ClearchatAction::ChatCleared => "rm-clearchat",
        ClearchatAction::Timeout { .. } => "rm-timeout",
        ClearchatAction::Permaban { .. } => "rm-permaban",
    }
}

/// Compact duration: `10s`, `10m`, `1h 30m`, `1d 2h`. Zero-valued units are
/// left out.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let count = secs / size;
        secs %= size;
        if count > 0 {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{count}{unit}");
        }
    }
    out
}

pub(crate) fn clearchat_to_notice(msg: &ClearchatMessage) -> Result<TwitchMessage, ContainerError> {
    let action = clearchat_action(msg)?;
    parse(format!(
        "@msg-id={} :tmi.twitch.tv NOTICE #{} :{}",
        clearchat_notice_id(&action),
        msg.channel_name(),
        clearchat_text(&action)
    ))
}

pub(crate) fn clearchat_to_privmsg(
    msg: &ClearchatMessage,
    create_time: i64,
) -> Result<TwitchMessage, ContainerError> {
    let action = clearchat_action(msg)?;
    let text = clearchat_text(&action);
    parse(
        PseudoPrivmsg {
            display_name: "CLEARCHAT",
            login: "clearchat",
            user_id: NOTICE_USER_ID,
            room_id: msg.irc().tag_value("room-id").unwrap_or("-1"),
            sent_ts: sent_ts(msg.irc(), create_time),
            id: synthesized_id(msg.irc(), 0),
            channel: msg.channel_name(),
            text: &text,
        }
        .render(),
    )
}

pub(crate) fn notice_to_privmsg(
    msg: &NoticeMessage,
    channel: &str,
    create_time: i64,
) -> Result<TwitchMessage, ContainerError> {
    parse(
        PseudoPrivmsg {
            display_name: "NOTICE",
            login: "notice",
            user_id: NOTICE_USER_ID,
            room_id: "-1",
            sent_ts: create_time.to_string(),
            id: synthesized_id(msg.irc(), 0),
            channel: msg.channel_name().unwrap_or(channel),
            text: msg.message_text(),
        }
        .render(),
    )
}

/// Up to two lines: the user's own text if they attached any, then the
/// system narration.
pub(crate) fn usernotice_to_privmsg(
    msg: &UsernoticeMessage,
    create_time: i64,
) -> Result<Vec<TwitchMessage>, ContainerError> {
    let irc = msg.irc();
    let mut out = Vec::with_capacity(2);

    if let Some(text) = msg.message_text().filter(|t| !t.is_empty()) {
        out.push(parse(user_line(msg, text, create_time))?);
    }

    out.push(parse(
        PseudoPrivmsg {
            display_name: "USERNOTICE",
            login: "usernotice",
            user_id: USERNOTICE_USER_ID,
            room_id: irc.tag_or_empty("room-id"),
            sent_ts: sent_ts(irc, create_time),
            id: synthesized_id(irc, 1),
            channel: msg.channel_name(),
            text: msg.system_message(),
        }
        .render(),
    )?);

    Ok(out)
}

/// The user's attached text as if they had sent it as a chat message.
fn user_line(msg: &UsernoticeMessage, text: &str, create_time: i64) -> String {
    const COPIED: [&str; 11] = [
        "badge-info",
        "color",
        "display-name",
        "emotes",
        "mod",
        "room-id",
        "subscriber",
        "turbo",
        "user-id",
        "user-type",
        "flags",
    ];

    let irc = msg.irc();
    let badges = match irc.tag_value("badges").filter(|b| !b.is_empty()) {
        Some(badges) => format!("twitchbot/1,{}", badges),
        None => "twitchbot/1".to_string(),
    };
    let id = irc
        .tag_value("id")
        .map(str::to_owned)
        .unwrap_or_else(|| synthesized_id(irc, 0).to_string());

    let mut line = String::from("@");
    let _ = write!(line, "badges={}", escape_tag_value(&badges));
    for key in COPIED {
        let _ = write!(line, ";{}={}", key, escape_tag_value(irc.tag_or_empty(key)));
    }
    let _ = write!(line, ";id={}", escape_tag_value(&id));
    let _ = write!(
        line,
        ";tmi-sent-ts={}",
        escape_tag_value(&sent_ts(irc, create_time))
    );

    let login = match msg.sender_username() {
        "" => "usernotice",
        login => login,
    };
    let _ = write!(
        line,
        " :{login}!{login}@{login}.tmi.twitch.tv PRIVMSG #{} :{}",
        msg.channel_name(),
        single_line(text)
    );
    line
}
