use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::decode::{classify, LineKind};
use crate::error::LoadError;

// Label -> memory address (line number)
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Labels defined by a program, in definition order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    table: FxMap<String, usize>,
}

impl SymbolTable {
    /// Scan every line for `name:` definitions.
    pub fn build<S: AsRef<str>>(lines: &[S]) -> Result<Self, LoadError> {
        let mut table = FxMap::with_hasher(FxBuildHasher::default());
        for (address, line) in lines.iter().enumerate() {
            let LineKind::Label(name) = classify(line.as_ref()) else {
                continue;
            };
            if let Some(first) = table.get(name) {
                return Err(LoadError::DuplicateLabel {
                    name: name.to_string(),
                    first: *first,
                    second: address,
                });
            }
            table.insert(name.to_string(), address);
        }
        Ok(SymbolTable { table })
    }

    /// Case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.table.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.table.iter().map(|(name, address)| (name.as_str(), *address))
    }

    /// First label bound to `address`.
    pub fn name_of(&self, address: usize) -> Option<&str> {
        self.iter()
            .find(|(_, bound)| *bound == address)
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_labels() {
        let symbols =
            SymbolTable::build(&["loop:", "INR", "JUZ end", "JUM loop", "end:", "FIN"]).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols.get("loop"), Some(0));
        assert_eq!(symbols.get("end"), Some(4));
        assert_eq!(symbols.get("End"), None);
        assert_eq!(symbols.name_of(4), Some("end"));
        assert_eq!(
            symbols.iter().collect::<Vec<_>>(),
            [("loop", 0), ("end", 4)]
        );
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(
            SymbolTable::build(&["a:", "a:", "FIN"]),
            Err(LoadError::DuplicateLabel {
                name: "a".into(),
                first: 0,
                second: 1,
            })
        );
    }
}
