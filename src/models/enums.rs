use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Variants serialize as their stored wire code, not the Rust name.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Single-letter codes are the stored data format (m/w/d/u).
str_enum!(Gender {
    Male => "m",
    Female => "w",
    Diverse => "d",
    Unknown => "u",
});

// Derived from `closed_at` alone; never stored on the case row.
str_enum!(CaseStatus {
    Current => "current",
    Closed => "closed",
});

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn gender_round_trips_wire_codes() {
        for code in ["m", "w", "d", "u"] {
            let g = Gender::from_str(code).unwrap();
            assert_eq!(g.as_str(), code);
        }
    }

    #[test]
    fn gender_rejects_unknown_code() {
        let err = Gender::from_str("x").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn gender_serializes_as_code() {
        let json = serde_json::to_string(&Gender::Female).unwrap();
        assert_eq!(json, "\"w\"");
        let back: Gender = serde_json::from_str("\"w\"").unwrap();
        assert_eq!(back, Gender::Female);
    }

    #[test]
    fn case_status_codes() {
        assert_eq!(CaseStatus::Current.as_str(), "current");
        assert_eq!(CaseStatus::from_str("closed").unwrap(), CaseStatus::Closed);
    }
}
