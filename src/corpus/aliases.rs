use std::collections::HashMap;

/// Alias title → raw target titles, both in first-seen order.
///
/// Targets are never deduplicated here: the same target seen from two
/// pages is stored twice and only collapses once resolved.
#[derive(Debug, Default)]
pub struct AliasGraph {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl AliasGraph {
    pub fn add(&mut self, alias: &str, target: &str) {
        match self.index.get(alias) {
            Some(&i) => self.entries[i].1.push(target.to_string()),
            None => {
                self.index.insert(alias.to_string(), self.entries.len());
                self.entries.push((alias.to_string(), vec![target.to_string()]));
            }
        }
    }

    pub fn targets(&self, alias: &str) -> Option<&[String]> {
        self.index.get(alias).map(|&i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(a, t)| (a.as_str(), t.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_multiplicity_and_order() {
        let mut g = AliasGraph::default();
        g.add("foo", "bar");
        g.add("qux", "bar");
        g.add("foo", "baz");
        g.add("foo", "bar");
        assert_eq!(g.targets("foo").unwrap(), &["bar", "baz", "bar"]);
        assert_eq!(g.len(), 2);
        assert_eq!(g.edge_count(), 4);
        let keys: Vec<_> = g.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["foo", "qux"]);
    }

    #[test]
    fn unknown_alias() {
        let g = AliasGraph::default();
        assert!(g.targets("nope").is_none());
        assert!(g.is_empty());
    }
}
