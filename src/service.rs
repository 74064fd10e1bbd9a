//! The read path: load a channel's log, run it through the frame pipeline,
//! make sure the channel is being listened to, and record the access.

use crate::container::{AppendOptions, export_records};
use crate::db::ChannelRegistry;
use crate::error::ServiceError;
use crate::feed::{FeedConnection, FeedError};
use crate::store::MessageStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const NOT_JOINED_ERROR: &str =
    "The bot is currently not joined to this channel (in progress or failed previously)";

/// Body of a recent-messages response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentMessagesResponse {
    pub messages: Vec<String>,
    pub error: Option<String>,
}

/// Shared handles for the read path and the bot.
#[derive(Clone)]
pub struct RecentMessages {
    pub store: Arc<dyn MessageStore>,
    pub registry: Arc<dyn ChannelRegistry>,
    pub feed: Arc<dyn FeedConnection>,
}

impl RecentMessages {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn ChannelRegistry>,
        feed: Arc<dyn FeedConnection>,
    ) -> Self {
        Self {
            store,
            registry,
            feed,
        }
    }

    /// Lowercase and validate a channel name taken from a request.
    pub fn normalize_channel(raw: &str) -> Result<String, ServiceError> {
        let channel = raw.to_lowercase();
        tmi_proto::validate_channel_name(&channel)
            .map_err(|_| ServiceError::InvalidChannel(raw.to_owned()))?;
        Ok(channel)
    }

    /// Stored log of `channel` rendered through the frame pipeline. Does not
    /// touch the registry.
    pub async fn load_export(
        &self,
        channel: &str,
        options: AppendOptions,
    ) -> Result<Vec<String>, ServiceError> {
        let records = self.store.get_messages(channel).await?;
        let messages = export_records(channel, &records, options)?;
        debug!(
            channel = %channel,
            stored = records.len(),
            exported = messages.len(),
            "Exported channel log"
        );
        Ok(messages)
    }

    /// [`load_export`](Self::load_export), then mark the channel as read.
    pub async fn retrieve_export(
        &self,
        channel: &str,
        options: AppendOptions,
    ) -> Result<Vec<String>, ServiceError> {
        let messages = self.load_export(channel, options).await?;
        self.registry.touch_or_add(channel).await?;
        Ok(messages)
    }

    /// Everything a recent-messages request returns.
    ///
    /// Joins the channel if it is not wanted yet. A refused join is reported
    /// in `error` next to the messages already stored; the channel is then
    /// left untouched so the vacuum eventually forgets it.
    pub async fn recent_messages(
        &self,
        channel: &str,
        options: AppendOptions,
    ) -> Result<RecentMessagesResponse, ServiceError> {
        let mut error = None;

        if !self.feed.wanted_channels().contains(channel) {
            info!(channel = %channel, "Joining requested channel");
            match self.feed.join(channel).await {
                Ok(()) => {}
                Err(e @ FeedError::Join { .. }) => error = Some(e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        if error.is_none() && !self.feed.joined_channels().contains(channel) {
            error = Some(NOT_JOINED_ERROR.to_owned());
        }

        let messages = match error {
            None => self.retrieve_export(channel, options).await?,
            Some(_) => self.load_export(channel, options).await?,
        };

        Ok(RecentMessagesResponse { messages, error })
    }
}
