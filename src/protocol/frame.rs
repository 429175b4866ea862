//! Wire framing for telemetry lines
//!
//! Checksummed frames look like `###<CHK>#<ts>,<label>,<val>###` where `<CHK>`
//! is the decimal XOR of every character code in the payload. Legacy frames
//! omit the checksum: `###<ts>, <label>, <val>###`.

use crate::types::Sample;
use serde::{Deserialize, Serialize};

/// Sentinel that opens and closes every frame
pub const SENTINEL: &str = "###";

/// Separator between the checksum and the payload
const CHECKSUM_SEPARATOR: char = '#';

/// Result of decoding one raw line
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The line was a valid frame
    Sample(Sample),
    /// The line was not a valid frame; no further detail is kept
    Rejected,
}

impl Decoded {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decoded::Rejected)
    }

    pub fn into_sample(self) -> Option<Sample> {
        match self {
            Decoded::Sample(sample) => Some(sample),
            Decoded::Rejected => None,
        }
    }
}

impl From<Option<Sample>> for Decoded {
    fn from(sample: Option<Sample>) -> Self {
        sample.map_or(Decoded::Rejected, Decoded::Sample)
    }
}

/// Framing variant understood by the built-in decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// `###<CHK>#<payload>###`
    #[default]
    Checksummed,
    /// `###<payload>###`
    Unchecked,
}

impl Framing {
    /// Decode a raw line with this framing
    pub fn decode(self, raw_line: &str) -> Decoded {
        match self {
            Framing::Checksummed => decode_checksummed(raw_line),
            Framing::Unchecked => decode_unchecked(raw_line),
        }
    }
}

/// Running XOR of the character codes of `payload`
pub fn checksum(payload: &str) -> u32 {
    payload.chars().fold(0, |acc, c| acc ^ c as u32)
}

/// Decode a legacy frame without checksum
pub fn decode_unchecked(raw_line: &str) -> Decoded {
    strip_sentinels(raw_line).and_then(parse_payload).into()
}

/// Decode a checksummed frame
///
/// A checksum mismatch is a dropped frame, not an error.
pub fn decode_checksummed(raw_line: &str) -> Decoded {
    let Some(interior) = strip_sentinels(raw_line) else {
        return Decoded::Rejected;
    };
    let Some((checksum_field, payload)) = interior.split_once(CHECKSUM_SEPARATOR) else {
        return Decoded::Rejected;
    };
    let Ok(expected) = checksum_field.trim().parse::<u32>() else {
        return Decoded::Rejected;
    };
    if checksum(payload) != expected {
        return Decoded::Rejected;
    }
    parse_payload(payload).into()
}

/// Encode a sample as a checksummed frame, including the trailing newline
pub fn encode_frame(sample: &Sample) -> String {
    let payload = format_payload(sample, ",");
    format!(
        "{SENTINEL}{}{CHECKSUM_SEPARATOR}{}{SENTINEL}\n",
        checksum(&payload),
        payload
    )
}

/// Encode a sample as a legacy frame, including the trailing newline
pub fn encode_legacy_frame(sample: &Sample) -> String {
    format!("{SENTINEL}{}{SENTINEL}\n", format_payload(sample, ", "))
}

fn format_payload(sample: &Sample, separator: &str) -> String {
    format!(
        "{:?}{sep}{}{sep}{:?}",
        sample.timestamp,
        sample.label,
        sample.value,
        sep = separator
    )
}

pub(crate) fn strip_sentinels(raw_line: &str) -> Option<&str> {
    raw_line
        .trim()
        .strip_prefix(SENTINEL)?
        .strip_suffix(SENTINEL)
}

/// Parse `<ts>,<label>,<val>` with surrounding whitespace trimmed per field
fn parse_payload(payload: &str) -> Option<Sample> {
    let mut fields = payload.split(',').map(str::trim);
    let timestamp = fields.next()?.parse::<f64>().ok()?;
    let label = fields.next()?;
    let value = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Sample::new(timestamp, label, value))
}
