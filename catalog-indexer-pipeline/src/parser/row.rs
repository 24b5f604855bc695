//! Mapping of feed lines to entries.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::errors::ParseError;
use catalog_indexer_shared::Entry;

/// Number of positional fields of an entry row.
pub const ROW_FIELDS: usize = 17;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Largest number the search index stores in a `long` field.
const MAX_INDEXED_NUMBER: u64 = i64::MAX as u64;

mod field {
    pub const CHANNEL: usize = 0;
    pub const TOPIC: usize = 1;
    pub const TITLE: usize = 2;
    pub const DURATION: usize = 5;
    pub const SIZE: usize = 6;
    pub const DESCRIPTION: usize = 7;
    pub const URL_VIDEO: usize = 8;
    pub const URL_WEBSITE: usize = 9;
    pub const URL_SUBTITLE: usize = 10;
    pub const URL_VIDEO_LOW: usize = 12;
    pub const URL_VIDEO_HD: usize = 14;
    pub const TIMESTAMP: usize = 16;
}

/// Second field of the metadata array: `"DD.MM.YYYY, HH:MM"`.
static RE_METADATA_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"".*?","(\d+)\.(\d+)\.(\d+),\s?(\d+):(\d+)""#).unwrap());

/// Extract the feed timestamp (`DD.MM.YYYY, HH:MM`, UTC) from the metadata
/// line as seconds since the Unix epoch.
pub fn parse_metadata_timestamp(line: &str) -> Result<i64, ParseError> {
    let captures = RE_METADATA_TIMESTAMP
        .captures(line)
        .ok_or_else(|| ParseError::metadata("no timestamp in metadata line"))?;

    let number = |index: usize| -> Result<u32, ParseError> {
        captures[index]
            .parse()
            .map_err(|_| ParseError::metadata(format!("invalid number '{}'", &captures[index])))
    };

    let (day, month, year) = (number(1)?, number(2)?, number(3)?);
    let (hour, minute) = (number(4)?, number(5)?);

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|datetime| datetime.and_utc().timestamp())
        .ok_or_else(|| {
            ParseError::metadata(format!(
                "invalid date {:02}.{:02}.{} {:02}:{:02}",
                day, month, year, hour, minute
            ))
        })
}

/// The integer at the start of `value`, ignoring surrounding whitespace and
/// anything after the first non-digit (`"850.5"` is 850).
fn leading_integer(value: &str) -> Option<u64> {
    let value = value.trim();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Parse a colon-delimited duration (`HH:MM:SS`, `MM:SS` or `SS`) into
/// seconds. Unparseable segments count as zero; a duration too large for
/// the index is zero.
pub fn parse_duration(value: &str) -> u64 {
    value
        .split(':')
        .try_fold(0u64, |seconds, segment| {
            seconds
                .checked_mul(60)?
                .checked_add(leading_integer(segment).unwrap_or(0))
        })
        .filter(|seconds| *seconds <= MAX_INDEXED_NUMBER)
        .unwrap_or(0)
}

/// Parse a size in megabytes into bytes. Unparseable sizes and sizes too
/// large for the index are zero.
pub fn parse_size(value: &str) -> u64 {
    leading_integer(value)
        .and_then(|megabytes| megabytes.checked_mul(BYTES_PER_MEGABYTE))
        .filter(|bytes| *bytes <= MAX_INDEXED_NUMBER)
        .unwrap_or(0)
}

/// Derive a URL from `base` and a `"<keep>|<suffix>"` patch: the first
/// `keep` characters of `base` followed by `suffix`.
///
/// A patch that does not have exactly two parts, or whose keep length is not
/// a number, yields an empty string.
pub fn apply_url_patch(base: &str, patch: &str) -> String {
    let parts: Vec<&str> = patch.split('|').collect();
    let [keep, suffix] = parts.as_slice() else {
        return String::new();
    };

    match keep.parse::<usize>() {
        Ok(keep) => base.chars().take(keep).chain(suffix.chars()).collect(),
        Err(_) => String::new(),
    }
}

/// Channel and topic carried over from the last row that had them.
#[derive(Debug, Clone, Default)]
pub struct RowCarry {
    channel: String,
    topic: String,
}

impl RowCarry {
    fn update(&mut self, channel: &str, topic: &str) {
        if !channel.is_empty() {
            self.channel = channel.to_string();
        }
        if !topic.is_empty() {
            self.topic = topic.to_string();
        }
    }
}

/// Map one entry line to an [`Entry`], updating the carried channel/topic.
///
/// `line_number` is only used for error reporting.
pub fn map_row(line: &str, line_number: u64, carry: &mut RowCarry) -> Result<Entry, ParseError> {
    let fields: Vec<String> =
        serde_json::from_str(line).map_err(|e| ParseError::row(line_number, e.to_string()))?;

    if fields.len() < ROW_FIELDS {
        return Err(ParseError::row(
            line_number,
            format!("expected {} fields, got {}", ROW_FIELDS, fields.len()),
        ));
    }

    carry.update(&fields[field::CHANNEL], &fields[field::TOPIC]);

    let url_video = &fields[field::URL_VIDEO];

    Ok(Entry {
        channel: carry.channel.clone(),
        topic: carry.topic.clone(),
        title: fields[field::TITLE].clone(),
        description: fields[field::DESCRIPTION].clone(),
        timestamp: fields[field::TIMESTAMP].trim().parse().unwrap_or(0),
        duration: parse_duration(&fields[field::DURATION]),
        size: parse_size(&fields[field::SIZE]),
        url_website: fields[field::URL_WEBSITE].clone(),
        url_subtitle: fields[field::URL_SUBTITLE].clone(),
        url_video: url_video.clone(),
        url_video_low: apply_url_patch(url_video, &fields[field::URL_VIDEO_LOW]),
        url_video_hd: apply_url_patch(url_video, &fields[field::URL_VIDEO_HD]),
    })
}
