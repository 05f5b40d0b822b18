//! Ordered product version

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::Error;

/// Version of the appliance product under test.
///
/// Releases compare component-wise with missing trailing components treated
/// as zero, so `5.8` and `5.8.0` are equal. `Latest` is the upstream build
/// and sorts above every release.
#[derive(Debug, Clone)]
pub enum Version {
    Release(Vec<u32>),
    Latest,
}

impl Version {
    pub fn new(components: &[u32]) -> Self {
        Version::Release(components.to_vec())
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Version::Latest)
    }

    /// Components with trailing zeros removed, used for equality and hashing
    fn significant(components: &[u32]) -> &[u32] {
        let len = components
            .iter()
            .rposition(|c| *c != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &components[..len]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Latest, Version::Latest) => Ordering::Equal,
            (Version::Latest, _) => Ordering::Greater,
            (_, Version::Latest) => Ordering::Less,
            (Version::Release(a), Version::Release(b)) => {
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                Ordering::Equal
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Version::Latest => state.write_u8(1),
            Version::Release(components) => {
                state.write_u8(0);
                Self::significant(components).hash(state);
            }
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "latest" | "master" | "upstream" => return Ok(Version::Latest),
            _ => {}
        }

        if s.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let components = s
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;

        Ok(Version::Release(components))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => write!(f, "latest"),
            Version::Release(components) => {
                let parts: Vec<String> = components.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join("."))
            }
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A bare `5.10` reaches us as the float 5.1, so only integers pass unquoted
        let raw = serde_json::Value::deserialize(deserializer)?;
        let text = match raw {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) if n.is_u64() => n.to_string(),
            serde_json::Value::Number(n) => {
                return Err(serde::de::Error::custom(format!(
                    "version {} must be quoted, e.g. \"{}\"",
                    n, n
                )))
            }
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a version string, got {}",
                    other
                )))
            }
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}
