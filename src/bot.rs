//! Interactive chat bot.
//!
//! Listens in its own channel on a separate chat connection and lets
//! broadcasters opt their channel out (`!ignoreme`), wipe its log
//! (`!wipeme`) or opt back in (`!addme`).

use crate::error::ServiceError;
use crate::feed::FeedConnection;
use crate::service::RecentMessages;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tmi_proto::{IrcMessage, TwitchMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const HELP: &str = "I am the interactive chatbot for the recent_messages service. \
     My commands are !ignoreme, !wipeme and !addme SeemsGood \
     More about this bot and the commands: https://www.twitch.tv/recent_messages";
const ALREADY_IGNORED: &str =
    "Your channel is already ignored! BrokeBack Type !addme if you want to remove your ignore.";
const IGNORED: &str = "The bot will now no longer listen to messages in your channel, \
     and all message data has been deleted! SeemsGood";
const WIPE_IGNORED: &str = "Your channel is ignored, so the service doesnt have any messages \
     for your channel! BrokeBack Type !addme if you want to remove your ignore.";
const WIPED: &str = "Got it! Deleted all messages stored for your channel. BibleThump";
const ALREADY_JOINED: &str = "The bot is already listening in your channel! \
     Type !removeme if you want to have your channel ignored. OpieOP";
const UNIGNORED: &str = "I am now no longer ignoring your channel, and the bot has started \
     collecting messages in your channel again! SeemsGood";
const ADDED: &str = "I am now collecting messages in your channel! SeemsGood";
const FAILED: &str = "sorry, something went wrong processing your command. :/";

/// Render an uptime as its largest whole unit, e.g. `3 hours`.
pub fn format_uptime(uptime: Duration) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

    let secs = uptime.as_secs();
    for (size, name) in UNITS {
        let count = secs / size;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {name}{plural}");
        }
    }
    "0 seconds".to_owned()
}

pub struct InteractiveBot {
    service: RecentMessages,
    username: String,
    started: Instant,
}

impl InteractiveBot {
    /// `service.feed` is the main feed whose channels the commands manage;
    /// `username` is the bot's login and its own channel.
    pub fn new(service: RecentMessages, username: &str) -> Self {
        Self {
            service,
            // channel names arrive lowercase
            username: username.to_lowercase(),
            started: Instant::now(),
        }
    }

    /// Run one command for `sender`, whose channel shares its login.
    /// Unknown commands yield `None`.
    pub async fn handle_command(
        &self,
        sender: &str,
        text: &str,
    ) -> Result<Option<&'static str>, ServiceError> {
        let registry = &self.service.registry;
        let store = &self.service.store;
        let feed = &self.service.feed;

        let reply = match text.split(' ').next().unwrap_or_default() {
            "!help" => HELP,
            "!ignoreme" => {
                if registry.is_ignored(sender).await? {
                    ALREADY_IGNORED
                } else {
                    registry.set_ignore_status(sender, true).await?;
                    feed.part(sender).await?;
                    crate::metrics::record_parted("ignored");
                    store.delete_messages(sender).await?;
                    info!(channel = %sender, "Channel opted out");
                    IGNORED
                }
            }
            "!wipeme" => {
                if registry.is_ignored(sender).await? {
                    WIPE_IGNORED
                } else {
                    store.delete_messages(sender).await?;
                    info!(channel = %sender, "Channel log wiped on request");
                    WIPED
                }
            }
            "!addme" => {
                if feed.joined_channels().contains(sender) {
                    ALREADY_JOINED
                } else {
                    registry.touch_or_add(sender).await?;
                    let was_ignored = registry.is_ignored(sender).await?;
                    feed.join(sender).await?;
                    if was_ignored {
                        registry.set_ignore_status(sender, false).await?;
                        info!(channel = %sender, "Channel opted back in");
                        UNIGNORED
                    } else {
                        info!(channel = %sender, "Channel added on request");
                        ADDED
                    }
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(reply))
    }

    /// The chat line to send in response to `msg`, if any.
    pub async fn respond(&self, msg: IrcMessage) -> Option<String> {
        let Ok(TwitchMessage::Privmsg(privmsg)) = TwitchMessage::from_irc(msg) else {
            return None;
        };
        if privmsg.channel_name() != self.username {
            return None;
        }

        let sender = privmsg.sender_username();
        let text = privmsg.message_text();
        let response = if text.split(' ').next() == Some("!ping") {
            format!("Pong! Running for {}", format_uptime(self.started.elapsed()))
        } else {
            match self.handle_command(sender, text).await {
                Ok(Some(reply)) => reply.to_owned(),
                Ok(None) => return None,
                Err(e) => {
                    warn!(sender = %sender, command = %text, error = %e, "Bot command failed");
                    FAILED.to_owned()
                }
            }
        };

        let display_name = privmsg
            .irc()
            .tag_value("display-name")
            .filter(|name| !name.is_empty())
            .unwrap_or(sender);
        Some(format!("{display_name}, {response}"))
    }

    /// Answer commands arriving on `inbound` through `chat` until the
    /// connection closes.
    pub async fn run(self, mut inbound: mpsc::Receiver<IrcMessage>, chat: Arc<dyn FeedConnection>) {
        if let Err(e) = chat.join(&self.username).await {
            warn!(channel = %self.username, error = %e, "Bot failed to join its channel");
        }

        while let Some(msg) = inbound.recv().await {
            let Some(reply) = self.respond(msg).await else {
                continue;
            };
            debug!(reply = %reply, "Bot reply");
            if let Err(e) = chat.say(&self.username, &reply).await {
                warn!(error = %e, "Failed to send bot reply");
            }
        }

        info!("Bot connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::feed::fake::FakeFeed;
    use crate::service::tests::service;

    async fn bot(feed: Arc<FakeFeed>) -> (InteractiveBot, Database) {
        let (svc, db) = service(feed).await;
        (InteractiveBot::new(svc, "recent_messages"), db)
    }

    fn line(channel: &str, sender: &str, text: &str) -> IrcMessage {
        IrcMessage::parse(&format!(
            "@display-name=Forsen :{sender}!{sender}@{sender}.tmi.twitch.tv PRIVMSG #{channel} :{text}"
        ))
        .unwrap()
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_millis(400)), "0 seconds");
        assert_eq!(format_uptime(Duration::from_secs(1)), "1 second");
        assert_eq!(format_uptime(Duration::from_secs(150)), "2 minutes");
        assert_eq!(format_uptime(Duration::from_secs(3 * 86_400 + 5)), "3 days");
    }

    #[tokio::test]
    async fn test_ignoreme_parts_and_wipes() {
        let feed = Arc::new(FakeFeed::with_joined(&["forsen"]));
        let (bot, _db) = bot(feed.clone()).await;
        bot.service.store.append("forsen", "x").await.unwrap();

        let reply = bot.handle_command("forsen", "!ignoreme").await.unwrap();
        assert_eq!(reply, Some(IGNORED));
        assert!(bot.service.registry.is_ignored("forsen").await.unwrap());
        assert_eq!(feed.part_calls.lock().clone(), vec!["forsen".to_string()]);
        assert!(bot.service.store.get_messages("forsen").await.unwrap().is_empty());

        let again = bot.handle_command("forsen", "!ignoreme").await.unwrap();
        assert_eq!(again, Some(ALREADY_IGNORED));
        assert_eq!(
            bot.handle_command("forsen", "!wipeme").await.unwrap(),
            Some(WIPE_IGNORED)
        );
    }

    #[tokio::test]
    async fn test_wipeme_keeps_channel() {
        let feed = Arc::new(FakeFeed::with_joined(&["forsen"]));
        let (bot, _db) = bot(feed.clone()).await;
        bot.service.store.append("forsen", "x").await.unwrap();

        let reply = bot.handle_command("forsen", "!wipeme please").await.unwrap();
        assert_eq!(reply, Some(WIPED));
        assert!(bot.service.store.get_messages("forsen").await.unwrap().is_empty());
        assert!(feed.part_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_addme_unignores() {
        let feed = Arc::new(FakeFeed::default());
        let (bot, _db) = bot(feed.clone()).await;

        assert_eq!(bot.handle_command("forsen", "!addme").await.unwrap(), Some(ADDED));
        assert_eq!(
            bot.handle_command("forsen", "!addme").await.unwrap(),
            Some(ALREADY_JOINED)
        );

        bot.handle_command("forsen", "!ignoreme").await.unwrap();
        assert_eq!(
            bot.handle_command("forsen", "!addme").await.unwrap(),
            Some(UNIGNORED)
        );
        assert!(!bot.service.registry.is_ignored("forsen").await.unwrap());
        assert!(feed.joined_channels().contains("forsen"));
    }

    #[tokio::test]
    async fn test_respond_only_in_own_channel() {
        let (bot, _db) = bot(Arc::new(FakeFeed::default())).await;

        assert!(bot.respond(line("forsen", "forsen", "!help")).await.is_none());
        assert_eq!(
            bot.respond(line("recent_messages", "forsen", "!help")).await,
            Some(format!("Forsen, {HELP}"))
        );
        assert!(
            bot.respond(line("recent_messages", "forsen", "hello"))
                .await
                .is_none()
        );
        let pong = bot
            .respond(line("recent_messages", "forsen", "!ping"))
            .await
            .unwrap();
        assert!(pong.starts_with("Forsen, Pong! Running for "));
    }

    #[tokio::test]
    async fn test_mixed_case_username_answers_in_own_channel() {
        let (svc, _db) = service(Arc::new(FakeFeed::default())).await;
        let bot = InteractiveBot::new(svc, "Recent_Messages");

        assert_eq!(
            bot.respond(line("recent_messages", "forsen", "!help")).await,
            Some(format!("Forsen, {HELP}"))
        );
    }

    #[tokio::test]
    async fn test_failed_command_apologizes() {
        let feed = Arc::new(FakeFeed::default());
        feed.refuse.lock().insert("forsen".to_string());
        let (bot, _db) = bot(feed).await;

        assert_eq!(
            bot.respond(line("recent_messages", "forsen", "!addme")).await,
            Some(format!("Forsen, {FAILED}"))
        );
    }

    #[tokio::test]
    async fn test_run_replies_through_chat_connection() {
        let (bot, _db) = bot(Arc::new(FakeFeed::default())).await;
        let chat = Arc::new(FakeFeed::default());
        let (tx, rx) = mpsc::channel(4);
        tx.send(line("recent_messages", "forsen", "!wipeme"))
            .await
            .unwrap();
        drop(tx);

        bot.run(rx, chat.clone()).await;

        assert_eq!(chat.join_calls.lock().clone(), vec!["recent_messages".to_string()]);
        assert_eq!(
            chat.said.lock().clone(),
            vec![("recent_messages".to_string(), format!("Forsen, {WIPED}"))]
        );
    }
}
