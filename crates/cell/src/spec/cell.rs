use chrono::NaiveDateTime;

use crate::spec::EncodeError;

/// The tuple rendered into a single ID.
///
/// A `Cell` lives only for the duration of one `generate_id` call: it is
/// built from the category code, the current local time, the configured
/// locality and a freshly allocated sequence, encoded, and dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Category code, exactly three ASCII digits.
    pub code: String,
    /// Production date. The date part always appears; the time part appears
    /// depending on the [`Pattern`](crate::Pattern).
    pub date: NaiveDateTime,
    /// Single-digit data center.
    pub data_center: u32,
    /// Two-digit machine.
    pub machine: u32,
    /// Allocated sequence value, rendered as ten zero-padded digits.
    pub sequence: u64,
}

impl Cell {
    pub fn builder() -> CellBuilder {
        CellBuilder::default()
    }
}

/// Incremental constructor for [`Cell`].
///
/// Every field is required; [`CellBuilder::build`] reports the first missing
/// one before any formatting is attempted.
///
/// # Example
///
/// ```
/// use cell::{Cell, CellSpec, Pattern};
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2023, 11, 5)
///     .unwrap()
///     .and_hms_opt(1, 40, 0)
///     .unwrap();
///
/// let cell = Cell::builder()
///     .code("101")
///     .date(date)
///     .data_center(2)
///     .machine(12)
///     .sequence(1_217_589)
///     .build()
///     .unwrap();
///
/// let id = CellSpec::new(Pattern::Day).encode(&cell).unwrap();
/// assert_eq!(id, "202311051012120001217589");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CellBuilder {
    code: Option<String>,
    date: Option<NaiveDateTime>,
    data_center: Option<u32>,
    machine: Option<u32>,
    sequence: Option<u64>,
}

impl CellBuilder {
    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn data_center(mut self, data_center: u32) -> Self {
        self.data_center = Some(data_center);
        self
    }

    #[must_use]
    pub fn machine(mut self, machine: u32) -> Self {
        self.machine = Some(machine);
        self
    }

    #[must_use]
    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Finishes the builder.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::MissingField`] naming the first unset field.
    pub fn build(self) -> Result<Cell, EncodeError> {
        Ok(Cell {
            code: self.code.ok_or(EncodeError::MissingField("code"))?,
            date: self.date.ok_or(EncodeError::MissingField("date"))?,
            data_center: self
                .data_center
                .ok_or(EncodeError::MissingField("data_center"))?,
            machine: self.machine.ok_or(EncodeError::MissingField("machine"))?,
            sequence: self.sequence.ok_or(EncodeError::MissingField("sequence"))?,
        })
    }
}
