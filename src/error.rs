use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClinicLedgerError {
    #[error("Invalid calendar date '{0}': expected YYYY/MM/DD")]
    InvalidCalendarDate(String),

    #[error("Calendar date out of supported range: {0}")]
    DateOutOfRange(String),

    #[error("Invalid period '{0}': expected 'YYYY/MM' or 'YYYY/MM:YYYY/MM'")]
    InvalidPeriod(String),

    #[error("Invalid window length {0}: a window spans at least one day")]
    InvalidWindow(u32),

    #[error("Invalid bucket count {0}: expected between 1 and the supported calendar span")]
    InvalidBucketCount(usize),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Cycle detected in chart of accounts at account {account_id}")]
    AccountCycle { account_id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClinicLedgerError>;
