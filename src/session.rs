use std::{fmt, str::FromStr};

use cookie::{time::Duration, Cookie, SameSite};
use uuid::Uuid;

use crate::time::Timestamp;

pub const COOKIE_NAME: &str = "sessionid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0.hyphenated())
    }
}

/// How sessions are handed to, and expired from, clients.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    secure: bool,
    lifetime_secs: i64,
}

impl SessionConfig {
    pub fn new(secure: bool, lifetime_days: u32) -> Self {
        Self {
            secure,
            lifetime_secs: i64::from(lifetime_days) * 24 * 60 * 60,
        }
    }

    /// Sessions created before this point have expired.
    pub fn expiry_cutoff(&self, now: Timestamp) -> Timestamp {
        now.minus_secs(self.lifetime_secs)
    }

    pub fn cookie(&self, session_id: &SessionId) -> String {
        Cookie::build((COOKIE_NAME, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(Duration::seconds(self.lifetime_secs))
            .build()
            .to_string()
    }

    pub fn removal_cookie(&self) -> String {
        let mut cookie = Cookie::build((COOKIE_NAME, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();

        cookie.make_removal();
        cookie.to_string()
    }
}
