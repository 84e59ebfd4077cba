//! Shared vocabulary: mechanism types, tiers, item categories, regions,
//! stat lines and combinator operators.
//!
//! Mechanism types, categories and stat lines are bit-flag sets so a single
//! value can name several members at once (a line table that applies to
//! `red | black`, a requirement on `att% | matt%`). Tiers and regions are
//! ordinary enums. Every type parses from and renders to lowercase names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WantError;

/// Declares a bit-flag newtype with named constants, set operations,
/// `|`-separated rendering/parsing and string serde.
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty), $kind:literal {
            $( $(#[$cmeta:meta])* $flag:ident = $bit:expr => $label:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(transparent)]
        pub struct $name($repr);

        impl $name {
            $( $(#[$cmeta])* pub const $flag: Self = Self($bit); )*

            /// No flags set.
            pub const EMPTY: Self = Self(0);

            /// Every named flag with its label, in declaration order.
            pub const NAMED: &'static [(Self, &'static str)] = &[ $( (Self::$flag, $label), )* ];

            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if the two sets share at least one bit.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Label of a single named flag, `None` for composites and unknown bits.
            pub fn name(self) -> Option<&'static str> {
                Self::NAMED.iter().find(|(f, _)| *f == self).map(|(_, n)| *n)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0 == 0 {
                    return write!(f, "none");
                }
                let mut rest = self.0;
                let mut first = true;
                for (flag, label) in Self::NAMED {
                    if flag.0 != 0 && rest & flag.0 == flag.0 {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{label}")?;
                        rest &= !flag.0;
                        first = false;
                    }
                }
                if rest != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "{rest:#x}")?;
                }
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = WantError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut out = Self::EMPTY;
                for part in s.split('|') {
                    let token = part.trim().to_lowercase();
                    if token == "none" {
                        continue;
                    }
                    let flag = Self::NAMED
                        .iter()
                        .find(|(_, label)| *label == token)
                        .map(|(f, _)| *f)
                        .ok_or_else(|| WantError::UnknownName {
                            kind: $kind,
                            token: part.trim().to_string(),
                        })?;
                    out |= flag;
                }
                Ok(out)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

flag_set! {
    /// Enhancement mechanism ("cube") type.
    Cube(u32), "mechanism" {
        RED = 1 << 0 => "red",
        BLACK = 1 << 1 => "black",
        BONUS = 1 << 2 => "bonus",
        OCCULT = 1 << 3 => "occult",
        MASTER = 1 << 4 => "master",
        MEISTER = 1 << 5 => "meister",
        VIOLET = 1 << 6 => "violet",
        EQUALITY = 1 << 7 => "equality",
        UNI = 1 << 8 => "uni",
        FAMILIAR = 1 << 9 => "familiar",
        RED_FAM_CARD = 1 << 10 => "red_fam_card",
    }
}

flag_set! {
    /// Item category.
    Category(u32), "category" {
        WEAPON = 1 << 0 => "weapon",
        SECONDARY = 1 << 1 => "secondary",
        EMBLEM = 1 << 2 => "emblem",
        HAT = 1 << 3 => "hat",
        TOP_OVERALL = 1 << 4 => "top",
        BOTTOM = 1 << 5 => "bottom",
        SHOE = 1 << 6 => "shoe",
        GLOVE = 1 << 7 => "glove",
        CAPE_BELT_SHOULDER = 1 << 8 => "cape",
        FACE_EYE_RING_EARRING_PENDANT = 1 << 9 => "accessory",
        HEART = 1 << 10 => "heart",
        BADGE = 1 << 11 => "badge",
        FAMILIAR_STATS = 1 << 12 => "familiar",
    }
}

flag_set! {
    /// Stat line identity.
    ///
    /// `LINES` and `ANY` are pseudo-lines: `LINES` inside a requirement group
    /// asks for a count of matching lines instead of a summed value, `ANY`
    /// stands for every line a query does not mention.
    Line(u64), "line" {
        STR_PERCENT = 1 << 0 => "str%",
        DEX_PERCENT = 1 << 1 => "dex%",
        INT_PERCENT = 1 << 2 => "int%",
        LUK_PERCENT = 1 << 3 => "luk%",
        ALLSTAT_PERCENT = 1 << 4 => "allstat%",
        HP_PERCENT = 1 << 5 => "hp%",
        ATT_PERCENT = 1 << 6 => "att%",
        MATT_PERCENT = 1 << 7 => "matt%",
        BOSS = 1 << 8 => "boss%",
        IED = 1 << 9 => "ied%",
        CRITDMG = 1 << 10 => "critdmg%",
        MESO = 1 << 11 => "meso%",
        DROP = 1 << 12 => "drop%",
        COOLDOWN = 1 << 13 => "cooldown",
        INVIN = 1 << 14 => "invin",
        DECENTS = 1 << 15 => "decents",
        FLAT_ATT = 1 << 16 => "flat_att",
        FLAT_MATT = 1 << 17 => "flat_matt",
        LINES = 1 << 62 => "lines",
        ANY = 1 << 63 => "any",
    }
}

/// Outcome tier, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Common,
    Rare,
    Epic,
    Unique,
    Legendary,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Common,
        Tier::Rare,
        Tier::Epic,
        Tier::Unique,
        Tier::Legendary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Common => "common",
            Tier::Rare => "rare",
            Tier::Epic => "epic",
            Tier::Unique => "unique",
            Tier::Legendary => "legendary",
        }
    }

    /// The tier one step down, `None` for the lowest.
    pub fn below(self) -> Option<Tier> {
        match self {
            Tier::Common => None,
            Tier::Rare => Some(Tier::Common),
            Tier::Epic => Some(Tier::Rare),
            Tier::Unique => Some(Tier::Epic),
            Tier::Legendary => Some(Tier::Unique),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = WantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.name() == token)
            .ok_or_else(|| WantError::UnknownName {
                kind: "tier",
                token: s.to_string(),
            })
    }
}

/// Regional ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Gms,
    Kms,
    Tms,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Gms, Region::Kms, Region::Tms];

    pub fn name(self) -> &'static str {
        match self {
            Region::Gms => "gms",
            Region::Kms => "kms",
            Region::Tms => "tms",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = WantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        Region::ALL
            .into_iter()
            .find(|r| r.name() == token)
            .ok_or_else(|| WantError::UnknownName {
                kind: "region",
                token: s.to_string(),
            })
    }
}

/// Combinator operator joining requirement groups.
///
/// The discriminants are the integer tokens used by host callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Or = 1,
    And = 2,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Or => "or",
            Operator::And => "and",
        }
    }

    /// Reduce two operands.
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            Operator::Or => a || b,
            Operator::And => a && b,
        }
    }

    /// Result of reducing zero operands.
    pub fn identity(self) -> bool {
        matches!(self, Operator::And)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Operator {
    type Error = WantError;

    fn try_from(token: i64) -> Result<Self, Self::Error> {
        match token {
            1 => Ok(Operator::Or),
            2 => Ok(Operator::And),
            _ => Err(WantError::UnknownOperator {
                token: token.to_string(),
            }),
        }
    }
}

impl FromStr for Operator {
    type Err = WantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "or" | "1" => Ok(Operator::Or),
            "and" | "2" => Ok(Operator::And),
            _ => Err(WantError::UnknownOperator {
                token: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_display_joins_names() {
        assert_eq!((Cube::RED | Cube::BLACK).to_string(), "red | black");
        assert_eq!(Cube::EMPTY.to_string(), "none");
        assert_eq!(Line::ATT_PERCENT.to_string(), "att%");
    }

    #[test]
    fn flag_display_keeps_unknown_bits() {
        let odd = Cube::from_bits(Cube::UNI.bits() | 1 << 20);
        assert_eq!(odd.to_string(), "uni | 0x100000");
    }

    #[test]
    fn flag_parse_is_case_insensitive() {
        assert_eq!("RED | Black".parse::<Cube>().unwrap(), Cube::RED | Cube::BLACK);
        assert_eq!("boss%".parse::<Line>().unwrap(), Line::BOSS);
        assert!("purple".parse::<Cube>().is_err());
    }

    #[test]
    fn flag_set_operations() {
        let tms = Cube::VIOLET | Cube::EQUALITY | Cube::UNI;
        assert!(tms.intersects(Cube::UNI));
        assert!(!tms.intersects(Cube::RED));
        assert!(tms.contains(Cube::VIOLET | Cube::UNI));
        assert_eq!((tms & Cube::UNI), Cube::UNI);
        assert_eq!(Cube::UNI.name(), Some("uni"));
        assert_eq!(tms.name(), None);
    }

    #[test]
    fn flag_serde_as_string() {
        let json = serde_json::to_string(&(Line::BOSS | Line::IED)).unwrap();
        assert_eq!(json, "\"boss% | ied%\"");
        let back: Line = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Line::BOSS | Line::IED);
    }

    #[test]
    fn tier_order_and_below() {
        assert!(Tier::Legendary > Tier::Unique);
        assert_eq!(Tier::Legendary.below(), Some(Tier::Unique));
        assert_eq!(Tier::Common.below(), None);
        assert_eq!("Epic".parse::<Tier>().unwrap(), Tier::Epic);
    }

    #[test]
    fn operator_tokens() {
        assert_eq!(Operator::try_from(1_i64).unwrap(), Operator::Or);
        assert_eq!(Operator::try_from(2_i64).unwrap(), Operator::And);
        assert_eq!(
            Operator::try_from(3_i64),
            Err(WantError::UnknownOperator { token: "3".into() })
        );
        assert_eq!("AND".parse::<Operator>().unwrap(), Operator::And);
        assert!("xor".parse::<Operator>().is_err());
    }

    #[test]
    fn operator_identity() {
        assert!(Operator::And.identity());
        assert!(!Operator::Or.identity());
        assert!(Operator::Or.apply(false, true));
        assert!(!Operator::And.apply(false, true));
    }
}
