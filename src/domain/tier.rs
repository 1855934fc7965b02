use serde::Serialize;

/// Subscription tiers, ordered from the least to the most capable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Plus,
    Pro,
    Ultra,
}

impl AsRef<str> for Tier {
    fn as_ref(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Plus => "plus",
            Tier::Pro => "pro",
            Tier::Ultra => "ultra",
        }
    }
}

impl TryFrom<String> for Tier {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_ref() {
            "free" => Ok(Tier::Free),
            "plus" => Ok(Tier::Plus),
            "pro" => Ok(Tier::Pro),
            "ultra" => Ok(Tier::Ultra),
            other => Err(format!("`{other}` is not a valid variant of Tier")),
        }
    }
}
