//! Outgoing command lines.
//!
//! Builders for the handful of client commands a TMI connection sends.
//! Lines are returned without CR/LF; the codec appends it.

/// Capabilities requested on every connection.
pub const TWITCH_CAPABILITIES: &str = "twitch.tv/commands twitch.tv/tags";

/// `CAP REQ` for the Twitch capabilities.
pub fn cap_req() -> String {
    format!("CAP REQ :{TWITCH_CAPABILITIES}")
}

/// `PASS <password>`.
pub fn pass(password: &str) -> String {
    format!("PASS {password}")
}

/// `NICK <nick>`.
pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

/// `JOIN #<channel>`.
pub fn join(channel: &str) -> String {
    format!("JOIN #{channel}")
}

/// `PART #<channel>`.
pub fn part(channel: &str) -> String {
    format!("PART #{channel}")
}

/// `PRIVMSG #<channel> :<text>`.
pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG #{channel} :{text}")
}

/// `PONG :<argument>`.
pub fn pong(argument: &str) -> String {
    format!("PONG :{argument}")
}

/// `PING :<argument>`.
pub fn ping(argument: &str) -> String {
    format!("PING :{argument}")
}
