use std::fmt;

/// Hierarchical cache key: `[ideas]` for a table, `[ideas, <id>]` for one row.
///
/// A tag covers itself and every tag it is a prefix of, so invalidating
/// `[ideas]` also invalidates every `[ideas, <id>]`, while invalidating
/// `[ideas, <id>]` leaves `[ideas]` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(Vec<String>);

impl Tag {
    /// The empty tag. Covers everything.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn table(table: &str) -> Self {
        Self(vec![table.to_string()])
    }

    pub fn record(table: &str, id: impl fmt::Display) -> Self {
        Self(vec![table.to_string(), id.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn covers(&self, other: &Tag) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Every tag that covers this one, root first, ending with `self`.
    pub fn ancestors(&self) -> impl Iterator<Item = Tag> + '_ {
        (0..=self.0.len()).map(|n| Tag(self.0[..n].to_vec()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
