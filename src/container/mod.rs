//! Frame transformation pipeline.
//!
//! A [`MessageContainer`] replays one channel's stored log, oldest first, into
//! the lines handed to a consumer. Moderation events retroactively mark the
//! frames they delete; every line is converted according to [`AppendOptions`]
//! and stamped as historical before export.

mod conversions;
mod frames;

pub use conversions::format_duration;
pub use frames::{DeletionTarget, OMITTED_NOTICE_IDS};

use crate::store::StoredRecord;
use serde::Deserialize;
use thiserror::Error;
use tmi_proto::{ProtocolError, TagMap, TwitchMessage, merge_tags};

/// Errors raised while replaying a stored log.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("stored line is not valid IRC: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("CLEARCHAT is neither a clear, a timeout nor a ban: {raw}")]
    MalformedClearchat { raw: String },
}

/// Consumer-selected export options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppendOptions {
    /// Rewrite `CLEARCHAT` as a `NOTICE` narrating it.
    pub clearchat_to_notice: bool,
    /// Rewrite every exportable line as a `PRIVMSG`.
    pub privmsg_only: bool,
    /// Drop `CLEARCHAT` and `CLEARMSG` lines.
    pub hide_moderation_messages: bool,
    /// Drop deleted messages instead of tagging them `rm-deleted`.
    pub hide_moderated_messages: bool,
}

/// One line on its way to export.
#[derive(Debug, Clone)]
pub struct ContainerFrame {
    /// What will be exported.
    pub shown: TwitchMessage,
    /// What was stored; deletion signals are matched against this.
    pub original: TwitchMessage,
    /// Merged onto the exported line's tags.
    pub extra_tags: TagMap,
    removed: bool,
}

impl ContainerFrame {
    fn new(shown: TwitchMessage, original: TwitchMessage, create_time: i64) -> Self {
        let mut extra_tags = TagMap::new();
        extra_tags.insert("historical", Some("1"));
        extra_tags.insert("rm-received-ts", Some(&create_time.to_string()));
        Self {
            shown,
            original,
            extra_tags,
            removed: false,
        }
    }

    /// The wire line with `extra_tags` merged in.
    pub fn export(&self) -> String {
        merge_tags(self.shown.raw(), &self.extra_tags)
    }
}

pub struct MessageContainer {
    channel: String,
    options: AppendOptions,
    frames: Vec<ContainerFrame>,
}

impl MessageContainer {
    pub fn new(channel: impl Into<String>, options: AppendOptions) -> Self {
        Self {
            channel: channel.into(),
            options,
            frames: Vec::new(),
        }
    }

    /// Feed the next stored record. Records must arrive in stored order.
    pub fn append(&mut self, record: &StoredRecord) -> Result<(), ContainerError> {
        let msg = TwitchMessage::parse(&record.message)?;

        if let Some(target) = frames::deletion_target(&msg)? {
            self.mark_deleted(&target);
        }

        let shown = frames::shown_messages(&msg, &self.channel, record.create_time, &self.options)?;
        self.frames.extend(
            shown
                .into_iter()
                .map(|shown| ContainerFrame::new(shown, msg.clone(), record.create_time)),
        );

        if self.options.hide_moderated_messages {
            self.frames.retain(|frame| !frame.removed);
        }
        Ok(())
    }

    fn mark_deleted(&mut self, target: &DeletionTarget) {
        let hide = self.options.hide_moderated_messages;
        for frame in self
            .frames
            .iter_mut()
            .filter(|frame| target.matches(&frame.original))
        {
            if hide {
                frame.removed = true;
            } else {
                frame.extra_tags.insert("rm-deleted", Some("1"));
            }
        }
    }

    pub fn frames(&self) -> &[ContainerFrame] {
        &self.frames
    }

    pub fn export(&self) -> Vec<String> {
        self.frames.iter().map(ContainerFrame::export).collect()
    }
}

/// Run the whole pipeline over a channel's log.
pub fn export_records(
    channel: &str,
    records: &[StoredRecord],
    options: AppendOptions,
) -> Result<Vec<String>, ContainerError> {
    let mut container = MessageContainer::new(channel, options);
    for record in records {
        container.append(record)?;
    }
    Ok(container.export())
}
