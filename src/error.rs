use std::fmt;

use thiserror::Error;

/// The catalog tables a lookup can miss in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Workload,
    Worktype,
    ComputeUnit,
    Datatype,
    Memory,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Workload => "workload",
            Table::Worktype => "worktype",
            Table::ComputeUnit => "compute unit",
            Table::Datatype => "datatype",
            Table::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown {table} '{key}'")]
    UnknownKey { table: Table, key: String },

    #[error(
        "{memory_channels} memory channels need {required_length_mm}mm but the budget is {total_length_mm}mm"
    )]
    InfeasibleBudget {
        memory_channels: u64,
        required_length_mm: f64,
        total_length_mm: f64,
    },

    #[error("budget of {total_length_mm}mm cannot fit one {per_channel_length_mm}mm channel")]
    BudgetTooSmall {
        total_length_mm: f64,
        per_channel_length_mm: f64,
    },

    #[error("{0} is not a power of two")]
    NotPowerOfTwo(u64),

    #[error("invalid {profile}: {field} cannot be {value}")]
    InvalidProfile {
        profile: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("{quantity} of {value} does not fit in a u64")]
    Overflow { quantity: &'static str, value: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn positive(profile: &'static str, field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidProfile {
            profile,
            field,
            value,
        })
    }
}

/// Like [`positive`] but admits zero.
pub(crate) fn non_negative(profile: &'static str, field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidProfile {
            profile,
            field,
            value,
        })
    }
}
