//! Domain identifier newtypes
//!
//! Every entity is keyed by a UUID wrapped in its own type so a loan id can
//! never be passed where a book id is expected.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID value
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| DomainError::InvalidId(format!("Invalid {}: {e}", $label)))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a catalog title (a book and its copies)
    BookId,
    "BookId"
);

uuid_id!(
    /// Identifier of a single loan record
    LoanId,
    "LoanId"
);

uuid_id!(
    /// Identifier of the library patron acting on a loan
    UserId,
    "UserId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip_through_strings() {
        let id = LoanId::new();
        let parsed: LoanId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<BookId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(ref msg) if msg.contains("BookId")));
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let uuid = Uuid::new_v4();
        let parsed: UserId = format!("  {uuid}\n").parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(BookId::new(), BookId::new());
    }
}
