//! Expiration status of a stored medication

use chrono::{Days, NaiveDate};

/// Window in which a not yet expired drug counts as expiring soon
pub const EXPIRING_SOON_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationStatus {
    Expired,
    ExpiringSoon,
    Active,
}

impl ExpirationStatus {
    /// A drug is expired from its expiration day on, and expiring soon
    /// during the `EXPIRING_SOON_DAYS` before that.
    pub fn classify(expires: NaiveDate, today: NaiveDate) -> Self {
        if expires <= today {
            return ExpirationStatus::Expired;
        }
        match today.checked_add_days(Days::new(EXPIRING_SOON_DAYS)) {
            Some(horizon) if expires <= horizon => ExpirationStatus::ExpiringSoon,
            _ => ExpirationStatus::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExpirationStatus::Expired => "expired",
            ExpirationStatus::ExpiringSoon => "expiring-soon",
            ExpirationStatus::Active => "active",
        }
    }
}

/// Date part of an ISO date or date-time string.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = value.split('T').next()?.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
