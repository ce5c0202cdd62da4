use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::DownloadId;

/// Time-remaining signal attached to a queue entry.
///
/// Upstream services report an estimate that is noisy and sometimes
/// missing. The three variants keep "we could not read it" apart from
/// "the source itself says this is stuck", even though the classifier
/// currently treats both as stalled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeLeft {
    /// A well-formed `HH:MM:SS` (or `D.HH:MM:SS`) estimate.
    Known(Duration),
    /// The source reports the entry as stuck and offers no estimate.
    Stalled,
    /// The field was absent, empty or malformed.
    Unknown,
}

impl TimeLeft {
    /// Parse the `timeleft` field of a v3 queue record.
    ///
    /// Accepts `HH:MM:SS` and the .NET `TimeSpan` day form `D.HH:MM:SS`.
    /// Hours must be below 24, minutes and seconds below 60. Anything else
    /// is [`TimeLeft::Unknown`].
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(parse_timespan)
            .map(TimeLeft::Known)
            .unwrap_or(TimeLeft::Unknown)
    }
}

fn parse_timespan(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (days, clock) = match raw.split_once('.') {
        Some((days, clock)) if !clock.contains('.') => {
            (parse_digits(days, usize::MAX)?, clock)
        }
        Some(_) => return None,
        None => (0, raw),
    };

    let mut parts = clock.split(':');
    let hours = parse_digits(parts.next()?, 2)?;
    let minutes = parse_digits(parts.next()?, 2)?;
    let seconds = parse_digits(parts.next()?, 2)?;
    if parts.next().is_some() || hours >= 24 || minutes >= 60 || seconds >= 60
    {
        return None;
    }

    let total = days
        .checked_mul(86_400)?
        .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
    Some(Duration::from_secs(total))
}

fn parse_digits(raw: &str, max_len: usize) -> Option<u64> {
    if raw.is_empty()
        || raw.len() > max_len
        || !raw.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    raw.parse().ok()
}

/// One actively downloading item as reported at poll time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: DownloadId,
    pub time_left: TimeLeft,
    /// Human-readable label, only used for logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl QueueEntry {
    pub fn new(id: DownloadId, time_left: TimeLeft) -> Self {
        Self {
            id,
            time_left,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
