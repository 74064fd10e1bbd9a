//! Channel name utilities.
//!
//! Twitch channels are named after the owning user's login: 1 to 25 characters
//! from `[a-z0-9_]`. On the wire they carry a leading `#`.

use crate::error::ProtocolError;

/// Maximum Twitch login length.
pub const MAX_CHANNEL_NAME_LEN: usize = 25;

/// Validate a (lowercase, `#`-less) channel name.
pub fn validate_channel_name(name: &str) -> Result<(), ProtocolError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CHANNEL_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidChannelName(name.to_owned()))
    }
}

/// Strip the leading `#` from a channel parameter.
///
/// Returns `None` when the parameter is not a channel (e.g. `*`).
pub fn channel_from_param(param: &str) -> Option<&str> {
    param.strip_prefix('#').filter(|name| !name.is_empty())
}
