//! Strongly-typed identifier value objects.
//!
//! Ledger rows are keyed by database-assigned integers, and buyers are
//! identified by their chat account number. Wrapping each in its own type
//! keeps a purchase id from ever being passed where a customer id belongs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw integer identifier.
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw integer identifier.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

ledger_id!(
    /// Identifier of a buyer in the Customer Directory.
    CustomerId
);

ledger_id!(
    /// Identifier of a purchase in the Purchase Ledger.
    PurchaseId
);

ledger_id!(
    /// Identifier of a referral row.
    ReferralId
);

ledger_id!(
    /// Account number of the buyer in the chat system.
    ///
    /// Doubles as the chat id for direct messages and as the lookup key
    /// in the VPN panel.
    TelegramId
);
