use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Process-wide interner for item ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Prefixes the editor uses for client-minted ids that the server has not
/// confirmed yet. Operations naming such ids are discarded on restore.
pub const DEFAULT_TEMP_PREFIXES: &[&str] = &["temp-", "tmp-", "local-"];

/// A lightweight, interned identifier for scene items (furniture, lights).
/// Internally a `Spur` index, so ids are `Copy` and hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(Spur);

impl ItemId {
    /// Intern a new string as an ItemId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        ItemId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique client-side id (e.g. `temp-3`) for an item the
    /// server has not acknowledged yet.
    pub fn temporary(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}{n}"))
    }

    /// True if the id starts with any of the given temporary prefixes.
    pub fn is_temporary<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        let s = self.as_str();
        prefixes.iter().any(|p| s.starts_with(p.as_ref()))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ItemId::intern(&s))
    }
}

/// Identifier of a scene document on the server.
///
/// Not interned. It appears verbatim in endpoint paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Wrap a server-assigned scene id.
    pub fn new(id: impl Into<String>) -> Self {
        SceneId(id.into())
    }

    /// The raw id, as used in endpoint paths.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
