use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Database-wide character set and ordering setting.
///
/// Stored on every root; staging copies the Working collation onto Staged
/// when the two differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Collation {
    /// Binary comparison of UTF-8 code points.
    #[default]
    Utf8Bin,
    /// Accent- and case-insensitive Unicode ordering.
    Utf8AiCi,
    /// Case-insensitive, accent-sensitive Unicode ordering.
    Utf8AsCi,
    /// Legacy general case-insensitive ordering.
    Utf8GeneralCi,
    /// Single-byte Latin-1 ordering.
    Latin1Swedish,
    /// Raw byte comparison.
    Binary,
}

impl Collation {
    pub const ALL: [Collation; 6] = [
        Self::Utf8Bin,
        Self::Utf8AiCi,
        Self::Utf8AsCi,
        Self::Utf8GeneralCi,
        Self::Latin1Swedish,
        Self::Binary,
    ];

    /// The SQL name, e.g. `utf8mb4_0900_bin`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8Bin => "utf8mb4_0900_bin",
            Self::Utf8AiCi => "utf8mb4_0900_ai_ci",
            Self::Utf8AsCi => "utf8mb4_0900_as_ci",
            Self::Utf8GeneralCi => "utf8mb4_general_ci",
            Self::Latin1Swedish => "latin1_swedish_ci",
            Self::Binary => "binary",
        }
    }

    /// Character set the collation belongs to.
    pub fn charset(&self) -> &'static str {
        match self {
            Self::Latin1Swedish => "latin1",
            Self::Binary => "binary",
            _ => "utf8mb4",
        }
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Collation {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Collation> for String {
    fn from(c: Collation) -> Self {
        c.name().to_string()
    }
}

impl FromStr for Collation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| TypeError::UnknownCollation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_binary_utf8() {
        assert_eq!(Collation::default(), Collation::Utf8Bin);
        assert_eq!(Collation::default().charset(), "utf8mb4");
    }

    #[test]
    fn names_parse_back() {
        for c in Collation::ALL {
            assert_eq!(c.name().parse::<Collation>().unwrap(), c);
        }
        assert_eq!(
            "UTF8MB4_0900_AI_CI".parse::<Collation>().unwrap(),
            Collation::Utf8AiCi
        );
    }

    #[test]
    fn serializes_as_name() {
        let json = serde_json::to_string(&Collation::Latin1Swedish).unwrap();
        assert_eq!(json, "\"latin1_swedish_ci\"");
        let back: Collation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Collation::Latin1Swedish);
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "klingon_ci".parse::<Collation>(),
            Err(TypeError::UnknownCollation("klingon_ci".into()))
        );
    }
}
