use std::collections::HashSet;

/// Traversal urls already entered during one walk.
///
/// Citation chains loop back on themselves, so every page visit goes
/// through [`VisitedSet::try_visit`] first.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` visited. Returns `false` without side effects when it
    /// already was.
    pub fn try_visit(&mut self, url: &str) -> bool {
        if self.urls.contains(url) {
            return false;
        }
        self.urls.insert(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
