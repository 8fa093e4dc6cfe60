//! # Listener categories.
//!
//! A [`Category`] is the tag that groups listeners notified together. It is an
//! explicit value passed at registration and carried by every [`Event`](crate::Event);
//! nothing is discovered from listener types at runtime.

use std::fmt;
use std::sync::Arc;

/// Tag identifying a family of listeners notified together.
///
/// Cheap to clone (`Arc<str>` inside). The empty tag is treated as a missing
/// category by registries.
///
/// # Example
/// ```rust
/// use eventvisor::Category;
///
/// let ping = Category::new("ping");
/// assert_eq!(ping.name(), "ping");
/// assert_eq!(ping, Category::from("ping"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(Arc<str>);

impl Category {
    /// Creates a category from its name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the category name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// True if the tag is empty (treated as missing).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Category> for Category {
    fn from(category: &Category) -> Self {
        category.clone()
    }
}
