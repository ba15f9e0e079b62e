use std::fmt;

use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Whole seconds since the unix epoch, as kept in the `sessions.created` column.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq)]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc().unix_timestamp())
    }

    #[cfg(test)]
    pub const fn from_i64(secs: i64) -> Self {
        Self(secs)
    }

    /// The point `secs` seconds before this one, never earlier than the epoch.
    pub fn minus_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_sub(secs).max(0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match OffsetDateTime::from_unix_timestamp(self.0) {
            Ok(when) => match when.format(&Rfc3339) {
                Ok(s) => fmt.write_str(&s),
                Err(_) => write!(fmt, "{}", self.0),
            },
            Err(_) => write!(fmt, "{}", self.0),
        }
    }
}
