use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Joins the two rendered member ids.
pub const SEPARATOR: char = '_';

/// Order-independent key shared by everything a couple owns.
///
/// Both member ids are rendered as lowercase hyphenated UUIDs, sorted
/// lexicographically and joined with [`SEPARATOR`], so
/// `CoupleId::from_pair(a, b) == CoupleId::from_pair(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoupleId {
    raw: String,
    low: Uuid,
    high: Uuid,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoupleIdError {
    #[error("couple id must contain '{SEPARATOR}'")]
    MissingSeparator,
    #[error("couple id member '{0}' is not a UUID")]
    InvalidMember(String),
    #[error("couple id members must be distinct")]
    SameMember,
    #[error("couple id is not in canonical form")]
    NotCanonical,
}

impl CoupleId {
    /// Never fails. Callers pair distinct users; `from_pair(a, a)` yields an
    /// id that [`FromStr`] would reject.
    pub fn from_pair(a: Uuid, b: Uuid) -> Self {
        let (sa, sb) = (render(a), render(b));
        let (low, high, sl, sh) = if sa <= sb {
            (a, b, sa, sb)
        } else {
            (b, a, sb, sa)
        };
        Self {
            raw: format!("{sl}{SEPARATOR}{sh}"),
            low,
            high,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Members in canonical (sorted) order.
    pub fn members(&self) -> (Uuid, Uuid) {
        (self.low, self.high)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The other member, if `user_id` belongs to this couple.
    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.low == user_id {
            Some(self.high)
        } else if self.high == user_id {
            Some(self.low)
        } else {
            None
        }
    }
}

fn render(id: Uuid) -> String {
    id.hyphenated().to_string()
}

impl FromStr for CoupleId {
    type Err = CoupleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(SEPARATOR)
            .ok_or(CoupleIdError::MissingSeparator)?;
        let a = Uuid::parse_str(a).map_err(|_| CoupleIdError::InvalidMember(a.to_string()))?;
        let b = Uuid::parse_str(b).map_err(|_| CoupleIdError::InvalidMember(b.to_string()))?;
        if a == b {
            return Err(CoupleIdError::SameMember);
        }
        let id = Self::from_pair(a, b);
        if id.raw != s {
            return Err(CoupleIdError::NotCanonical);
        }
        Ok(id)
    }
}

impl TryFrom<String> for CoupleId {
    type Error = CoupleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CoupleId> for String {
    fn from(id: CoupleId) -> Self {
        id.raw
    }
}

impl fmt::Display for CoupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for CoupleId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
