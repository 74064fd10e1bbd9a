//! Per-kind dispatch tables: which stored lines are exportable, what earlier
//! frames a moderation event deletes, and what a line becomes under the
//! requested options.

use super::conversions::{
    clearchat_action, clearchat_to_notice, clearchat_to_privmsg, notice_to_privmsg,
    usernotice_to_privmsg,
};
use super::{AppendOptions, ContainerError};
use tmi_proto::{ClearchatAction, TwitchMessage};

/// Notice ids that are never worth replaying.
pub const OMITTED_NOTICE_IDS: [&str; 5] = [
    "no_permission",
    "host_on",
    "host_off",
    "host_target_went_offline",
    "msg_channel_suspended",
];

/// Which earlier frames a moderation event applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    /// Every message in the channel.
    Channel(String),
    /// Messages sent by one user.
    User { channel: String, username: String },
    /// One message by id.
    Message { channel: String, message_id: String },
}

impl DeletionTarget {
    /// Only chat messages and user notices can be deleted.
    pub fn matches(&self, original: &TwitchMessage) -> bool {
        let (channel, sender, message_id) = match original {
            TwitchMessage::Privmsg(m) => (m.channel_name(), m.sender_username(), m.message_id()),
            TwitchMessage::Usernotice(m) => {
                (m.channel_name(), m.sender_username(), m.message_id())
            }
            _ => return false,
        };

        match self {
            DeletionTarget::Channel(target) => channel == target,
            DeletionTarget::User {
                channel: target,
                username,
            } => channel == target && sender.eq_ignore_ascii_case(username),
            DeletionTarget::Message {
                channel: target,
                message_id: id,
            } => channel == target && message_id == Some(id.as_str()),
        }
    }
}

/// The earlier frames `msg` deletes, if it is a moderation event.
pub fn deletion_target(msg: &TwitchMessage) -> Result<Option<DeletionTarget>, ContainerError> {
    Ok(match msg {
        TwitchMessage::Clearchat(c) => {
            let channel = c.channel_name().to_owned();
            Some(match clearchat_action(c)? {
                ClearchatAction::ChatCleared => DeletionTarget::Channel(channel),
                ClearchatAction::Timeout {
                    target_username, ..
                }
                | ClearchatAction::Permaban { target_username } => DeletionTarget::User {
                    channel,
                    username: target_username,
                },
            })
        }
        TwitchMessage::Clearmsg(c) => Some(DeletionTarget::Message {
            channel: c.channel_name().to_owned(),
            message_id: c.target_message_id().to_owned(),
        }),
        _ => None,
    })
}

fn is_omitted(msg: &TwitchMessage) -> bool {
    match msg {
        TwitchMessage::Notice(n) => n
            .message_id()
            .is_some_and(|id| OMITTED_NOTICE_IDS.contains(&id)),
        _ => false,
    }
}

/// The lines to show for `msg`, in order. Empty when it is not exported.
pub fn shown_messages(
    msg: &TwitchMessage,
    channel: &str,
    create_time: i64,
    options: &AppendOptions,
) -> Result<Vec<TwitchMessage>, ContainerError> {
    if matches!(msg, TwitchMessage::Other(_)) || is_omitted(msg) {
        return Ok(Vec::new());
    }

    if options.hide_moderation_messages
        && matches!(msg, TwitchMessage::Clearchat(_) | TwitchMessage::Clearmsg(_))
    {
        return Ok(Vec::new());
    }

    if options.privmsg_only {
        return Ok(match msg {
            TwitchMessage::Privmsg(_) => vec![msg.clone()],
            TwitchMessage::Clearchat(c) => vec![clearchat_to_privmsg(c, create_time)?],
            TwitchMessage::Usernotice(u) => usernotice_to_privmsg(u, create_time)?,
            TwitchMessage::Notice(n) => vec![notice_to_privmsg(n, channel, create_time)?],
            _ => Vec::new(),
        });
    }

    if options.clearchat_to_notice
        && let TwitchMessage::Clearchat(c) = msg
    {
        return Ok(vec![clearchat_to_notice(c)?]);
    }

    Ok(vec![msg.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmi_proto::MessageKind;

    const PRIVMSG: &str = "@id=m1;login=alice :alice!alice@alice.tmi.twitch.tv PRIVMSG #forsen :hi";
    const CLEARCHAT: &str = ":tmi.twitch.tv CLEARCHAT #forsen";
    const CLEARMSG: &str = "@login=alice;target-msg-id=m1 :tmi.twitch.tv CLEARMSG #forsen :hi";
    const USERNOTICE: &str = r"@login=alice;msg-id=sub;system-msg=Alice\ssubscribed! :tmi.twitch.tv USERNOTICE #forsen :yay";
    const NOTICE: &str = "@msg-id=emote_only_on :tmi.twitch.tv NOTICE #forsen :This room is now in emote-only mode.";
    const ROOMSTATE: &str = "@emote-only=1;room-id=1 :tmi.twitch.tv ROOMSTATE #forsen";

    fn shown(raw: &str, options: &AppendOptions) -> Vec<TwitchMessage> {
        let msg = TwitchMessage::parse(raw).unwrap();
        shown_messages(&msg, "forsen", 0, options).unwrap()
    }

    fn kinds(msgs: &[TwitchMessage]) -> Vec<MessageKind> {
        msgs.iter().map(TwitchMessage::kind).collect()
    }

    #[test]
    fn test_default_exports_all_six_kinds_unchanged() {
        let options = AppendOptions::default();
        for raw in [PRIVMSG, CLEARCHAT, CLEARMSG, USERNOTICE, NOTICE, ROOMSTATE] {
            let out = shown(raw, &options);
            assert_eq!(out.len(), 1, "{raw}");
            assert_eq!(out[0].raw(), raw);
        }
    }

    #[test]
    fn test_other_kinds_never_exported() {
        let options = AppendOptions::default();
        assert!(shown(":alice!alice@alice.tmi.twitch.tv JOIN #forsen", &options).is_empty());
        assert!(shown("@login=alice :tmi.twitch.tv USERSTATE #forsen", &options).is_empty());
    }

    #[test]
    fn test_omitted_notices_dropped() {
        let options = AppendOptions::default();
        for id in OMITTED_NOTICE_IDS {
            let raw = format!("@msg-id={id} :tmi.twitch.tv NOTICE #forsen :text");
            assert!(shown(&raw, &options).is_empty(), "{id}");
        }
    }

    #[test]
    fn test_hide_moderation_messages() {
        let options = AppendOptions {
            hide_moderation_messages: true,
            ..Default::default()
        };
        assert!(shown(CLEARCHAT, &options).is_empty());
        assert!(shown(CLEARMSG, &options).is_empty());
        assert_eq!(shown(PRIVMSG, &options).len(), 1);
    }

    #[test]
    fn test_privmsg_only_totality() {
        let options = AppendOptions {
            privmsg_only: true,
            ..Default::default()
        };
        let cases = [
            (PRIVMSG, 1),
            (CLEARCHAT, 1),
            (CLEARMSG, 0),
            (USERNOTICE, 2),
            (NOTICE, 1),
            (ROOMSTATE, 0),
        ];
        for (raw, expected) in cases {
            let out = shown(raw, &options);
            assert_eq!(out.len(), expected, "{raw}");
            assert!(kinds(&out).iter().all(|k| *k == MessageKind::Privmsg));
        }
    }

    #[test]
    fn test_clearchat_to_notice_option() {
        let options = AppendOptions {
            clearchat_to_notice: true,
            ..Default::default()
        };
        let out = shown(CLEARCHAT, &options);
        assert_eq!(kinds(&out), vec![MessageKind::Notice]);
        assert_eq!(out[0].irc().tag_value("msg-id"), Some("rm-clearchat"));
    }

    #[test]
    fn test_deletion_targets() {
        let privmsg = TwitchMessage::parse(PRIVMSG).unwrap();
        let other_user = TwitchMessage::parse(
            "@id=m2 :bob!bob@bob.tmi.twitch.tv PRIVMSG #forsen :hello",
        )
        .unwrap();
        let roomstate = TwitchMessage::parse(ROOMSTATE).unwrap();

        let clear = deletion_target(&TwitchMessage::parse(CLEARCHAT).unwrap())
            .unwrap()
            .unwrap();
        assert!(clear.matches(&privmsg));
        assert!(clear.matches(&other_user));
        assert!(!clear.matches(&roomstate));

        let ban = deletion_target(
            &TwitchMessage::parse(":tmi.twitch.tv CLEARCHAT #forsen :alice").unwrap(),
        )
        .unwrap()
        .unwrap();
        assert!(ban.matches(&privmsg));
        assert!(!ban.matches(&other_user));

        let single = deletion_target(&TwitchMessage::parse(CLEARMSG).unwrap())
            .unwrap()
            .unwrap();
        assert!(single.matches(&privmsg));
        assert!(!single.matches(&other_user));

        assert!(deletion_target(&privmsg).unwrap().is_none());
    }
}
