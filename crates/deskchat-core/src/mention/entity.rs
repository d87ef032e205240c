//! Closed set of entity kinds a mention may reference.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The kind of domain entity a mention token points at.
///
/// This is a closed enumeration: mention encodings carrying any other tag are
/// not mentions and are rendered as literal text. Remote payloads are decoded
/// through [`EntityKind::from_str`] so unknown tags are rejected at the
/// boundary instead of leaking into the domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A support ticket.
    Ticket,
    /// A support agent handling tickets.
    Supporter,
    /// An end customer.
    Customer,
    /// A customer account (organization).
    Account,
    /// A ticket category.
    Category,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(EntityKind::from_str("ticket").unwrap(), EntityKind::Ticket);
        assert_eq!(
            EntityKind::from_str("supporter").unwrap(),
            EntityKind::Supporter
        );
        assert_eq!(
            EntityKind::from_str("category").unwrap(),
            EntityKind::Category
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(EntityKind::from_str("widget").is_err());
        assert!(EntityKind::from_str("Ticket").is_err());
        assert!(EntityKind::from_str("").is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for kind in EntityKind::iter() {
            assert_eq!(EntityKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }
}
