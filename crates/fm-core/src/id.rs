use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for node and edge IDs — fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for nodes and edges in the graph.
/// Internally a `Spur` index — 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a new string as a NodeId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique ID with a type prefix (e.g. `container_1`, `edge_2`).
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}_{n}"))
    }

    /// Parse the trailing run of ASCII digits, if any.
    ///
    /// Generated IDs carry a monotonically increasing counter suffix, so a
    /// larger suffix means a more recently created node. The drop-target
    /// ranking uses this as its final tie-break.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let s = self.as_str();
        let digits = s.len() - s.bytes().rev().take_while(u8::is_ascii_digit).count();
        if digits == s.len() {
            return None;
        }
        s[digits..].parse().ok()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

/// Edge identifier. Edges share the interner and id space with nodes; the
/// alias marks intent at call sites that key edges rather than nodes.
pub type EdgeId = NodeId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("topic_main");
        let b = NodeId::intern("topic_main");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "topic_main");
    }

    #[test]
    fn prefixed_ids_are_unique() {
        let a = NodeId::with_prefix("node");
        let b = NodeId::with_prefix("node");
        assert_ne!(a, b);
    }

    #[test]
    fn numeric_suffix_parsing() {
        assert_eq!(NodeId::intern("node_42").numeric_suffix(), Some(42));
        assert_eq!(NodeId::intern("edge7").numeric_suffix(), Some(7));
        assert_eq!(NodeId::intern("root").numeric_suffix(), None);
        // All-digit IDs are a suffix with no stem — not treated as generated.
        assert_eq!(NodeId::intern("1234").numeric_suffix(), None);
    }
}
