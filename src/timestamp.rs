// Copyright (c) 2019, 2020 Codethink Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Fixed timestamps for layer entries and the image creation time.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};

pub const EPOCH: &str = "EPOCH";
pub const EPOCH_PLUS_SECOND: &str = "EPOCH_PLUS_SECOND";
pub const USE_CURRENT_TIMESTAMP: &str = "USE_CURRENT_TIMESTAMP";

/// Default policy for file modification times. Some consumers reject a zero mtime.
pub const DEFAULT_FILES_MODIFICATION_TIME: &str = EPOCH_PLUS_SECOND;
pub const DEFAULT_CREATION_TIME: &str = EPOCH;

/// Offset formats accepted besides RFC 3339. `%z` takes `+0000` as well as `+00:00`.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

pub fn resolve_timestamp(policy: &str) -> Result<DateTime<Utc>> {
    match policy {
        EPOCH => Ok(epoch_plus_seconds(0)),
        EPOCH_PLUS_SECOND => Ok(epoch_plus_seconds(1)),
        USE_CURRENT_TIMESTAMP => Ok(Utc::now()),
        other => parse_date_time(other),
    }
}

fn epoch_plus_seconds(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn parse_date_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    Err(Error::config(format!(
        "'{}' is not {}, {}, {} or an ISO-8601 date-time with offset",
        value, EPOCH, EPOCH_PLUS_SECOND, USE_CURRENT_TIMESTAMP
    )))
}

/// Supplies the modification time of every layer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationTimeProvider {
    instant: DateTime<Utc>,
}

impl ModificationTimeProvider {
    pub fn from_policy(policy: &str) -> Result<Self> {
        Ok(ModificationTimeProvider {
            instant: resolve_timestamp(policy)?,
        })
    }

    pub fn get(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl Default for ModificationTimeProvider {
    fn default() -> Self {
        ModificationTimeProvider {
            instant: epoch_plus_seconds(1),
        }
    }
}

/// Seconds since the epoch, clamped at zero for tar headers.
pub fn unix_seconds(instant: &DateTime<Utc>) -> u64 {
    instant.timestamp().max(0) as u64
}

/// RFC 3339 rendering used in image configs.
pub fn format_created(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
