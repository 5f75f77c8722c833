use core::{fmt, str::FromStr};

use crate::{
    Error,
    spec::{CODE_LEN, DATA_CENTER_LEN, DATE_LEN, HOUR_LEN, MACHINE_LEN, MINUTE_LEN, SEQUENCE_LEN},
};

/// Time granularity embedded in an encoded cell.
///
/// The pattern decides whether a time component follows the locality fields
/// and therefore the total length of every ID produced under it:
///
/// | Pattern  | Time field | Length |
/// |----------|------------|--------|
/// | `Day`    | none       | 24     |
/// | `Hour`   | `HH`       | 26     |
/// | `Minute` | `HHmm`     | 28     |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Pattern {
    #[default]
    Day,
    Hour,
    Minute,
}

impl Pattern {
    /// Width of the time component inserted after the machine field.
    pub const fn time_len(self) -> usize {
        match self {
            Self::Day => 0,
            Self::Hour => HOUR_LEN,
            Self::Minute => MINUTE_LEN,
        }
    }

    /// Total length of a cell encoded under this pattern.
    pub const fn encoded_len(self) -> usize {
        DATE_LEN + CODE_LEN + DATA_CENTER_LEN + MACHINE_LEN + self.time_len() + SEQUENCE_LEN
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Hour => "HOUR",
            Self::Minute => "MINUTE",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY" => Ok(Self::Day),
            "HOUR" => Ok(Self::Hour),
            "MINUTE" => Ok(Self::Minute),
            other => Err(Error::Configuration {
                reason: format!("unknown pattern `{other}`, expected DAY, HOUR or MINUTE"),
            }),
        }
    }
}
