/// A violation of the fixed-width cell layout.
///
/// Each rule enforced by [`CellSpec::encode`] has its own variant so callers
/// can tell exactly which field was rejected.
///
/// [`CellSpec::encode`]: crate::CellSpec::encode
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A required field was never set on the builder.
    #[error("cell field `{0}` is missing")]
    MissingField(&'static str),

    /// The category code is empty or whitespace only.
    #[error("cell code is blank")]
    BlankCode,

    /// The category code is not exactly [`CODE_LEN`] characters.
    ///
    /// [`CODE_LEN`]: crate::CODE_LEN
    #[error("cell code `{code}` must be {expected} characters, got {actual}")]
    CodeLength {
        code: String,
        expected: usize,
        actual: usize,
    },

    /// The category code contains something other than ASCII digits.
    #[error("cell code `{0}` must be ASCII digits")]
    NonDigitCode(String),

    /// The data center does not fit in a single digit.
    #[error("data center {0} does not fit in 1 digit")]
    DataCenterOutOfRange(u32),

    /// The machine does not fit in two digits.
    #[error("machine {0} does not fit in 2 digits")]
    MachineOutOfRange(u32),

    /// The sequence does not fit in ten digits.
    #[error("sequence {0} does not fit in 10 digits")]
    SequenceOverflow(u64),

    /// The production date's year does not fit in four digits.
    #[error("year {0} does not fit in 4 digits")]
    DateOutOfRange(i32),
}
