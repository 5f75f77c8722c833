use core::fmt::Write;

use chrono::{Datelike, Timelike};

use crate::spec::{Cell, EncodeError, Pattern};

/// Width of the `yyyyMMdd` date prefix.
pub const DATE_LEN: usize = 8;
/// Width of the category code.
pub const CODE_LEN: usize = 3;
/// Width of the data center field.
pub const DATA_CENTER_LEN: usize = 1;
/// Width of the machine field.
pub const MACHINE_LEN: usize = 2;
/// Width of the hour field under [`Pattern::Hour`].
pub const HOUR_LEN: usize = 2;
/// Width of the hour+minute field under [`Pattern::Minute`].
pub const MINUTE_LEN: usize = 4;
/// Width of the zero-padded sequence suffix.
pub const SEQUENCE_LEN: usize = 10;

/// Largest data center that fits in [`DATA_CENTER_LEN`] digits.
pub const MAX_DATA_CENTER: u32 = 9;
/// Largest machine that fits in [`MACHINE_LEN`] digits.
pub const MAX_MACHINE: u32 = 99;
/// Largest sequence that fits in [`SEQUENCE_LEN`] digits.
pub const MAX_SEQUENCE: u64 = 9_999_999_999;

/// Stateless encoder for the canonical cell layout:
///
/// ```text
/// date(8) code(3) dataCenter(1) machine(2) [hour(2) | hourMinute(4)] sequence(10)
/// ```
///
/// All fields are decimal, with no separators. The time component comes from
/// the same timestamp as the date prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellSpec {
    pattern: Pattern,
}

impl CellSpec {
    pub const fn new(pattern: Pattern) -> Self {
        Self { pattern }
    }

    pub const fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Renders `cell` into its fixed-width string form.
    ///
    /// The output is always [`Pattern::encoded_len`] characters long.
    ///
    /// # Errors
    ///
    /// Fails without producing output when any field violates its width:
    /// - [`EncodeError::BlankCode`] / [`EncodeError::CodeLength`] /
    ///   [`EncodeError::NonDigitCode`]
    /// - [`EncodeError::DataCenterOutOfRange`] for values above 9
    /// - [`EncodeError::MachineOutOfRange`] for values above 99
    /// - [`EncodeError::SequenceOverflow`] for values of 10^10 and up
    /// - [`EncodeError::DateOutOfRange`] for years outside `0..=9999`
    pub fn encode(&self, cell: &Cell) -> Result<String, EncodeError> {
        let mut out = String::with_capacity(self.pattern.encoded_len());
        self.encode_into(cell, &mut out)?;
        Ok(out)
    }

    /// Like [`Self::encode`], appending into a caller-owned buffer.
    ///
    /// On error `out` is left untouched.
    pub fn encode_into(&self, cell: &Cell, out: &mut String) -> Result<(), EncodeError> {
        Self::validate(cell)?;

        let date = &cell.date;
        // Writing into a `String` cannot fail.
        let _ = write!(
            out,
            "{:04}{:02}{:02}{}{:01}{:02}",
            date.year(),
            date.month(),
            date.day(),
            cell.code,
            cell.data_center,
            cell.machine,
        );
        let _ = match self.pattern {
            Pattern::Day => Ok(()),
            Pattern::Hour => write!(out, "{:02}", date.hour()),
            Pattern::Minute => write!(out, "{:02}{:02}", date.hour(), date.minute()),
        };
        let _ = write!(out, "{:0width$}", cell.sequence, width = SEQUENCE_LEN);
        Ok(())
    }

    fn validate(cell: &Cell) -> Result<(), EncodeError> {
        if cell.code.trim().is_empty() {
            return Err(EncodeError::BlankCode);
        }
        let code_len = cell.code.chars().count();
        if code_len != CODE_LEN {
            return Err(EncodeError::CodeLength {
                code: cell.code.clone(),
                expected: CODE_LEN,
                actual: code_len,
            });
        }
        if !cell.code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EncodeError::NonDigitCode(cell.code.clone()));
        }
        if cell.data_center > MAX_DATA_CENTER {
            return Err(EncodeError::DataCenterOutOfRange(cell.data_center));
        }
        if cell.machine > MAX_MACHINE {
            return Err(EncodeError::MachineOutOfRange(cell.machine));
        }
        if cell.sequence > MAX_SEQUENCE {
            return Err(EncodeError::SequenceOverflow(cell.sequence));
        }
        let year = cell.date.year();
        if !(0..=9999).contains(&year) {
            return Err(EncodeError::DateOutOfRange(year));
        }
        Ok(())
    }
}
