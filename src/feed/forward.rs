//! Inbound line forwarder: every channel line from the feed goes to the store.

use crate::metrics;
use crate::store::MessageStore;
use std::sync::Arc;
use tmi_proto::{IrcMessage, channel_from_param};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

/// Append inbound lines to `store` until the feed closes. Lines are handled
/// one at a time so each channel's log keeps feed order.
pub async fn run_forwarder(mut inbound: mpsc::Receiver<IrcMessage>, store: Arc<dyn MessageStore>) {
    while let Some(msg) = inbound.recv().await {
        let Some(channel) = msg.param(0).and_then(channel_from_param) else {
            continue;
        };

        metrics::record_received();
        trace!(channel = %channel, command = %msg.command(), "Storing line");

        match store.append(channel, msg.raw()).await {
            Ok(()) => metrics::record_appended(),
            Err(e) => {
                metrics::record_append_failure();
                warn!(channel = %channel, error = %e, "Failed to append message");
            }
        }
    }

    info!("Inbound feed closed, forwarder stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_forwards_channel_lines_in_order() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let (tx, rx) = mpsc::channel(8);

        let lines = [
            "@id=1 :alice!alice@alice.tmi.twitch.tv PRIVMSG #forsen :one",
            ":tmi.twitch.tv 001 justinfan123 :Welcome, GLHF!",
            "@room-id=1 :tmi.twitch.tv ROOMSTATE #pajlada",
            "@id=2 :bob!bob@bob.tmi.twitch.tv PRIVMSG #forsen :two",
        ];
        for line in lines {
            tx.send(IrcMessage::parse(line).unwrap()).await.unwrap();
        }
        drop(tx);

        run_forwarder(rx, store.clone()).await;

        let forsen: Vec<_> = store
            .get_messages("forsen")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(forsen, vec![lines[0].to_string(), lines[3].to_string()]);
        assert_eq!(store.get_messages("pajlada").await.unwrap().len(), 1);
        assert_eq!(store.list_channels_with_messages().await.unwrap().len(), 2);
    }
}
