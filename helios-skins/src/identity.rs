use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Opaque key identifying a player account, usually its UUID.
///
/// Cloning is cheap, the underlying string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Arc<str>);

impl Identity {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity with dashes removed, the form the session server expects for UUIDs.
    pub fn undashed(&self) -> String {
        self.0.chars().filter(|c| *c != '-').collect()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&&*self.0).finish()
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undashed_strips_uuid_dashes() {
        let id = Identity::from("069a79f4-44e9-4726-a5be-fca90e38aaf5");
        assert_eq!(id.undashed(), "069a79f444e94726a5befca90e38aaf5");
    }

    #[test]
    fn serde_is_transparent() {
        let id = Identity::from("A");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A\"");
        let back: Identity = serde_json::from_str("\"A\"").unwrap();
        assert_eq!(back, id);
    }
}
