//! Canonical agent names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SwarmError;

/// Prefix every canonical agent name carries.
pub const NAME_PREFIX: char = '@';

/// Canonical agent identity, always rendered as `@bare`.
///
/// The bare part must start with an ASCII alphanumeric and may contain
/// alphanumerics, `-`, `_` and `.` since it is embedded in backend
/// environment names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    /// Normalize `raw` (`dogen` or `@dogen`) into canonical form.
    pub fn parse(raw: &str) -> Result<Self, SwarmError> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix(NAME_PREFIX).unwrap_or(trimmed);

        let invalid = |reason: &str| SwarmError::InvalidName {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let first = bare.chars().next().ok_or_else(|| invalid("name is empty"))?;
        if !first.is_ascii_alphanumeric() {
            return Err(invalid("must start with a letter or digit"));
        }
        if let Some(bad) = bare
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(invalid(&format!("character {bad:?} is not allowed")));
        }

        Ok(Self(format!("{NAME_PREFIX}{bare}")))
    }

    /// Canonical form, e.g. `@dogen`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the prefix, e.g. `dogen`.
    pub fn bare(&self) -> &str {
        &self.0[NAME_PREFIX.len_utf8()..]
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentName {
    type Error = SwarmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgentName> for String {
    fn from(name: AgentName) -> Self {
        name.0
    }
}

/// Canonicalize a list of raw names, dropping repeats (first occurrence wins).
pub fn parse_names<S: AsRef<str>>(raw: &[S]) -> Result<Vec<AgentName>, SwarmError> {
    let mut names: Vec<AgentName> = Vec::with_capacity(raw.len());
    for r in raw {
        let name = AgentName::parse(r.as_ref())?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}
