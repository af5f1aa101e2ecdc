//! Expiration policy: TTL directives and the per-key registry.
//!
//! A directive says how long a cached response may be reused. The registry
//! maps URLs and derived cache keys to directives and remembers which keys
//! changed since they were last consulted.

mod registry;

pub use registry::ExpirationRegistry;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};

use crate::Error;

/// TTL directive attached to a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpireAfter {
    /// The entry never expires.
    Never,
    /// Inherit the session's configured expiry.
    #[default]
    Default,
    /// The entry expires this long after creation. Zero or negative means
    /// it is never reused.
    Duration(TimeDelta),
}

impl ExpireAfter {
    /// Normalize a number of seconds into a `Duration` directive.
    ///
    /// Fractional and negative values are accepted. NaN, infinities and
    /// anything beyond `TimeDelta`'s millisecond range are rejected.
    pub fn from_secs_f64(secs: f64) -> Result<Self, Error> {
        if !secs.is_finite() {
            return Err(Error::InvalidTtl(format!("{secs} is not a finite number of seconds")));
        }
        let out_of_range = || Error::InvalidTtl(format!("{secs} seconds is out of range"));

        // Whole milliseconds carry the range; the sub-millisecond rest keeps
        // nanosecond precision for short TTLs.
        let millis = secs * 1e3;
        if millis.abs() >= i64::MAX as f64 {
            return Err(out_of_range());
        }
        let whole = TimeDelta::try_milliseconds(millis.trunc() as i64).ok_or_else(out_of_range)?;
        let rest = TimeDelta::nanoseconds(((millis - millis.trunc()) * 1e6).round() as i64);
        whole.checked_add(&rest).map(Self::Duration).ok_or_else(out_of_range)
    }

    /// Whole-second shorthand for `Duration`.
    pub fn seconds(secs: i64) -> Self {
        Self::Duration(TimeDelta::seconds(secs))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Concrete expiry for this directive, where `None` means never expire.
    ///
    /// `Default` resolves to the supplied session expiry.
    pub fn resolve(self, session_default: Option<TimeDelta>) -> Option<TimeDelta> {
        match self {
            Self::Never => None,
            Self::Default => session_default,
            Self::Duration(d) => Some(d),
        }
    }
}

/// Whether an entry created at `created_at` is stale at `now` under `expiry`.
///
/// `None` never expires. An entry expires once its age is strictly greater
/// than the expiry, so a zero or negative expiry expires immediately.
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, expiry: Option<TimeDelta>) -> bool {
    match expiry {
        None => false,
        Some(ttl) => now.signed_duration_since(created_at) > ttl,
    }
}

impl From<TimeDelta> for ExpireAfter {
    fn from(d: TimeDelta) -> Self {
        Self::Duration(d)
    }
}

impl From<Option<TimeDelta>> for ExpireAfter {
    fn from(d: Option<TimeDelta>) -> Self {
        d.map_or(Self::Never, Self::Duration)
    }
}

impl TryFrom<std::time::Duration> for ExpireAfter {
    type Error = Error;

    fn try_from(d: std::time::Duration) -> Result<Self, Error> {
        TimeDelta::from_std(d)
            .map(Self::Duration)
            .map_err(|e| Error::InvalidTtl(e.to_string()))
    }
}

impl FromStr for ExpireAfter {
    type Err = Error;

    /// Parses `default`, `never`/`none`, or a decimal number of seconds.
    fn from_str(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "never" | "none" => Ok(Self::Never),
            _ => {
                let secs: f64 = trimmed
                    .parse()
                    .map_err(|_| Error::InvalidTtl(format!("unrecognized TTL {s:?}")))?;
                Self::from_secs_f64(secs)
            }
        }
    }
}

impl fmt::Display for ExpireAfter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::Default => f.write_str("default"),
            Self::Duration(d) => match d.num_nanoseconds() {
                Some(nanos) if nanos % 1_000_000_000 == 0 => write!(f, "{}s", d.num_seconds()),
                Some(nanos) => write!(f, "{}s", nanos as f64 / 1e9),
                None => write!(f, "{}s", d.num_seconds()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!("default".parse::<ExpireAfter>().unwrap(), ExpireAfter::Default);
        assert_eq!("never".parse::<ExpireAfter>().unwrap(), ExpireAfter::Never);
        assert_eq!(" None ".parse::<ExpireAfter>().unwrap(), ExpireAfter::Never);
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!("5".parse::<ExpireAfter>().unwrap(), ExpireAfter::seconds(5));
        assert_eq!("-1".parse::<ExpireAfter>().unwrap(), ExpireAfter::seconds(-1));
        assert_eq!(
            "0.1".parse::<ExpireAfter>().unwrap(),
            ExpireAfter::Duration(TimeDelta::milliseconds(100))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("soon".parse::<ExpireAfter>(), Err(Error::InvalidTtl(_))));
        assert!(matches!("".parse::<ExpireAfter>(), Err(Error::InvalidTtl(_))));
        assert!(matches!("inf".parse::<ExpireAfter>(), Err(Error::InvalidTtl(_))));
        assert!(matches!("NaN".parse::<ExpireAfter>(), Err(Error::InvalidTtl(_))));
    }

    #[test]
    fn test_from_secs_out_of_range() {
        assert!(ExpireAfter::from_secs_f64(1e17).is_err());
        assert!(ExpireAfter::from_secs_f64(-1e17).is_err());
    }

    #[test]
    fn test_from_secs_centuries() {
        assert_eq!(ExpireAfter::from_secs_f64(1e10).unwrap(), ExpireAfter::seconds(10_000_000_000));
        assert_eq!(ExpireAfter::from_secs_f64(-1e12).unwrap(), ExpireAfter::seconds(-1_000_000_000_000));
        assert_eq!(ExpireAfter::seconds(10_000_000_000).to_string(), "10000000000s");
        assert_eq!(
            ExpireAfter::from_secs_f64(0.0015).unwrap(),
            ExpireAfter::Duration(TimeDelta::microseconds(1_500))
        );
    }

    #[test]
    fn test_from_std_duration() {
        let ttl = ExpireAfter::try_from(std::time::Duration::from_secs(3)).unwrap();
        assert_eq!(ttl, ExpireAfter::seconds(3));
    }

    #[test]
    fn test_resolve() {
        let session = Some(TimeDelta::seconds(60));
        assert_eq!(ExpireAfter::Never.resolve(session), None);
        assert_eq!(ExpireAfter::Default.resolve(session), session);
        assert_eq!(ExpireAfter::Default.resolve(None), None);
        assert_eq!(ExpireAfter::seconds(2).resolve(session), Some(TimeDelta::seconds(2)));
    }

    #[test]
    fn test_is_expired() {
        let created = Utc::now();
        let later = created + TimeDelta::seconds(2);
        assert!(!is_expired(created, later, None));
        assert!(!is_expired(created, later, Some(TimeDelta::seconds(5))));
        assert!(is_expired(created, later, Some(TimeDelta::seconds(1))));
        assert!(is_expired(created, created, Some(TimeDelta::seconds(-1))));
        assert!(!is_expired(created, created, Some(TimeDelta::zero())));
    }

    #[test]
    fn test_display() {
        assert_eq!(ExpireAfter::Never.to_string(), "never");
        assert_eq!(ExpireAfter::Default.to_string(), "default");
        assert_eq!(ExpireAfter::seconds(10).to_string(), "10s");
        assert_eq!(ExpireAfter::Duration(TimeDelta::milliseconds(250)).to_string(), "0.25s");
    }
}
