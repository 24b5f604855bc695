//! Catalog entry model.
//!
//! An [`Entry`] is one item of the published catalog feed. Its identity is
//! derived from its content, so identical rows in two snapshots collapse to
//! the same [`EntryId`] and duplicates within one snapshot are deduplicated by
//! the identity set.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived identity of an entry (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Compute the identity of an entry from its content.
    pub fn of(entry: &Entry) -> Self {
        let mut hasher = Sha256::new();

        for field in [
            entry.channel.as_str(),
            entry.topic.as_str(),
            entry.title.as_str(),
            entry.description.as_str(),
            entry.url_website.as_str(),
            entry.url_subtitle.as_str(),
            entry.url_video.as_str(),
            entry.url_video_low.as_str(),
            entry.url_video_hd.as_str(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }

        hasher.update(entry.timestamp.to_le_bytes());
        hasher.update(entry.duration.to_le_bytes());
        hasher.update(entry.size.to_le_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed identity.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One catalog item as parsed from the feed.
///
/// This is also the document body stored in the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Broadcasting channel.
    pub channel: String,
    /// Topic (show or series) the item belongs to.
    pub topic: String,
    /// Item title.
    pub title: String,
    /// Free text description.
    pub description: String,
    /// Broadcast time in seconds since the Unix epoch (UTC).
    pub timestamp: i64,
    /// Duration in seconds.
    pub duration: u64,
    /// Size of the default video in bytes.
    pub size: u64,
    /// Landing page of the item.
    pub url_website: String,
    /// Subtitle file, empty if none.
    pub url_subtitle: String,
    /// Default quality video.
    pub url_video: String,
    /// Low quality video, empty if none.
    pub url_video_low: String,
    /// High quality video, empty if none.
    pub url_video_hd: String,
}

impl Entry {
    /// Identity of this entry.
    pub fn id(&self) -> EntryId {
        EntryId::of(self)
    }
}
