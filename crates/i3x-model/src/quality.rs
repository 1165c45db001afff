use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Quality annotation carried by every [`crate::Record`].
///
/// `spec.md` §3 only pins down `GOOD`, `BAD`, and `GoodNoData` as canonical
/// members and leaves the set open ("..."); `Other` preserves whatever
/// string a data source emits without forcing it through one of the three
/// known variants, so a non-conforming backend never fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Good,
    Bad,
    GoodNoData,
    Other(String),
}

impl Quality {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Good => "GOOD",
            Self::Bad => "BAD",
            Self::GoodNoData => "GoodNoData",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Quality {
    fn from(s: &str) -> Self {
        match s {
            "GOOD" => Self::Good,
            "BAD" => Self::Bad,
            "GoodNoData" => Self::GoodNoData,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Quality::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_and_unknown_values() {
        for q in [Quality::Good, Quality::Bad, Quality::GoodNoData, Quality::Other("Uncertain".into())] {
            let json = serde_json::to_string(&q).unwrap();
            let back: Quality = serde_json::from_str(&json).unwrap();
            assert_eq!(q, back);
        }
    }
}
