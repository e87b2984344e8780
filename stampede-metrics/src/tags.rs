use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    // SmallVec to avoid allocation for small tag sets (usually < 4)
    tags: SmallVec<[(Arc<str>, Arc<str>); 4]>,
}

impl TagSet {
    /// Builds a tag set from unordered pairs. Later duplicates of a key win.
    pub fn new(tags: &[(&str, &str)]) -> Self {
        let mut out: SmallVec<[(Arc<str>, Arc<str>); 4]> = SmallVec::with_capacity(tags.len());
        for (k, v) in tags {
            match out.iter_mut().find(|(ek, _)| ek.as_ref() == *k) {
                Some(slot) => slot.1 = Arc::from(*v),
                None => out.push((Arc::from(*k), Arc::from(*v))),
            }
        }
        out.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        Self { tags: out }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let idx = self
            .tags
            .binary_search_by(|(k, _)| k.as_ref().cmp(key))
            .ok()?;
        self.tags.get(idx).map(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }
}
