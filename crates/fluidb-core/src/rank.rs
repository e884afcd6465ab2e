//! Storage ranks.
//!
//! A rank orders column types by storage capability: a column of rank `r`
//! can hold, without loss, any value whose rank is `<= r`. Each dialect
//! supplies an ordered table mapping its ranks to SQL type names; the
//! comparison logic here is dialect-agnostic.

use std::fmt;

/// Ordinal storage capability of a value or column.
///
/// Variant order is the total order: `Null < Tier(_) < Static(_) < Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    /// No value to classify.
    Null,
    /// Widenable type; higher tiers hold everything lower tiers hold.
    Tier(u8),
    /// Fixed type such as a date-time or GUID; never widened once created.
    Static(u8),
    /// A type the engine cannot generate or widen.
    Custom,
}

impl Rank {
    /// Ranks at or above this threshold are static.
    pub const STATIC_BASE: Rank = Rank::Static(0);

    /// Returns true for ranks at or above [`Rank::STATIC_BASE`].
    pub fn is_static(self) -> bool {
        self >= Self::STATIC_BASE
    }

    /// Returns true for [`Rank::Custom`].
    pub fn is_custom(self) -> bool {
        self == Rank::Custom
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Null => write!(f, "null"),
            Rank::Tier(n) => write!(f, "tier{}", n),
            Rank::Static(n) => write!(f, "static{}", n),
            Rank::Custom => write!(f, "custom"),
        }
    }
}

/// One row of a dialect's rank table.
pub type RankEntry = (Rank, &'static str);

/// Looks up the SQL type of a rank.
pub fn sql_type_of(table: &[RankEntry], rank: Rank) -> Option<&'static str> {
    table.iter().find(|(r, _)| *r == rank).map(|(_, ty)| *ty)
}

/// Looks up the rank of a SQL type name, case-insensitively and ignoring
/// surrounding whitespace. Unknown types rank as [`Rank::Custom`].
pub fn rank_of(table: &[RankEntry], sql_type: &str) -> Rank {
    let wanted = sql_type.trim();
    table
        .iter()
        .find(|(_, ty)| ty.eq_ignore_ascii_case(wanted))
        .map_or(Rank::Custom, |(r, _)| *r)
}
