//! Identity types
//!
//! Prefixed string ids backed by UUIDv4. The prefix makes ids
//! self-describing in logs and ledger rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::new_v4()))
            }

            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// A confirmed rental booking
    BookingId,
    "bkg"
);
string_id!(
    /// A damage claim against a booking
    ClaimId,
    "clm"
);
string_id!(
    /// A marketplace user (owner or renter)
    UserId,
    "usr"
);
string_id!(
    /// An operator with privileged fund access
    AdminId,
    "adm"
);
string_id!(
    /// An append-only guarantee fund movement
    MovementId,
    "mov"
);

/// ISO 3166-1 alpha-2 country code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryCode(pub String);

impl CountryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
