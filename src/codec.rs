//! Protobuf codec for GTFS Realtime feeds.

use anyhow::Result;
use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Encodes a [`FeedMessage`] in the GTFS-RT binary wire format.
pub fn encode_feed(feed: &FeedMessage) -> Vec<u8> {
    feed.encode_to_vec()
}

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}
