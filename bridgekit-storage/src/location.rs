use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Marker accepted wherever a path is expected to request an in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Where an entry store keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file, created on first open.
    File(PathBuf),
    /// A private in-memory database that disappears with the store.
    #[default]
    InMemory,
}

impl StoreLocation {
    pub fn parse(s: &str) -> Self {
        if s.trim() == IN_MEMORY {
            Self::InMemory
        } else {
            Self::File(PathBuf::from(s))
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, Self::InMemory)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => f.write_str(IN_MEMORY),
        }
    }
}

impl FromStr for StoreLocation {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
