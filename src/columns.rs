//! Mapping from physical header positions to requested column slots.

use foldhash::{HashMap, HashMapExt};

use crate::error::{CsvError, Result};
use crate::policy::HeaderPolicy;

/// Why a header line does not match the requested columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeaderMismatch {
    Duplicate(String),
    Missing(String),
    Extra(String),
}

/// Requested column names and where each one sits in the header.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    /// Requested names, in caller order. Empty before any header is known.
    names: Vec<String>,
    /// For each physical column, the slot it feeds (`None` = ignored).
    physical: Vec<Option<usize>>,
    /// Whether each slot was found in the header.
    found: Vec<bool>,
    lookup: HashMap<String, usize>,
}

impl ColumnMap {
    /// Physical column `i` feeds slot `i`.
    pub fn identity(columns: usize) -> Self {
        Self {
            names: Vec::new(),
            physical: (0..columns).map(Some).collect(),
            found: vec![true; columns],
            lookup: HashMap::new(),
        }
    }

    /// Check a caller's column request: right count, no repeats.
    pub fn check_request(columns: usize, names: &[&str]) -> Result<()> {
        if names.len() != columns {
            return Err(CsvError::InvalidConfig(format!(
                "{} column name(s) given for a reader of {columns} column(s)",
                names.len()
            )));
        }
        let mut seen = HashMap::with_capacity(names.len());
        for name in names {
            if seen.insert(*name, ()).is_some() {
                return Err(CsvError::InvalidConfig(format!(
                    "column \"{name}\" requested more than once"
                )));
            }
        }
        Ok(())
    }

    /// Physical order equals requested order.
    pub fn in_order(names: &[&str]) -> Self {
        let mut map = Self::identity(names.len());
        map.set_names(names);
        map
    }

    /// Match the cleaned header fields against the requested names.
    pub fn resolve<'h, I>(
        names: &[&str],
        header: I,
        policy: HeaderPolicy,
    ) -> std::result::Result<Self, HeaderMismatch>
    where
        I: IntoIterator<Item = &'h [u8]>,
    {
        let mut map = Self {
            names: Vec::new(),
            physical: Vec::new(),
            found: vec![false; names.len()],
            lookup: HashMap::with_capacity(names.len()),
        };
        map.set_names(names);

        for field in header {
            let slot = names.iter().position(|n| n.as_bytes() == field);
            match slot {
                Some(slot) if map.found[slot] => {
                    return Err(HeaderMismatch::Duplicate(names[slot].to_string()));
                }
                Some(slot) => {
                    map.found[slot] = true;
                    map.physical.push(Some(slot));
                }
                None if policy.ignore_extra => map.physical.push(None),
                None => {
                    return Err(HeaderMismatch::Extra(
                        String::from_utf8_lossy(field).into_owned(),
                    ));
                }
            }
        }

        if !policy.ignore_missing
            && let Some(slot) = map.found.iter().position(|&f| !f)
        {
            return Err(HeaderMismatch::Missing(names[slot].to_string()));
        }
        Ok(map)
    }

    fn set_names(&mut self, names: &[&str]) {
        self.names = names.iter().map(|n| n.to_string()).collect();
        self.lookup = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
    }

    /// Slot fed by each physical column.
    pub fn physical(&self) -> &[Option<usize>] {
        &self.physical
    }

    /// Requested names; empty when no header was set.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True if `name` was requested and present in the header.
    pub fn has_column(&self, name: &str) -> bool {
        self.lookup.get(name).is_some_and(|&slot| self.found[slot])
    }

    /// Name used in error messages for `slot`.
    pub fn display_name(&self, slot: usize) -> String {
        self.names
            .get(slot)
            .cloned()
            .unwrap_or_else(|| format!("#{}", slot + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(fields: &[&'static str]) -> Vec<&'static [u8]> {
        fields.iter().map(|f| f.as_bytes()).collect()
    }

    #[test]
    fn test_resolve_reordered() {
        let map =
            ColumnMap::resolve(&["b", "a"], header(&["a", "b"]), HeaderPolicy::STRICT).unwrap();
        assert_eq!(map.physical(), &[Some(1), Some(0)]);
        assert!(map.has_column("a"));
        assert!(!map.has_column("c"));
    }

    #[test]
    fn test_resolve_extra_columns() {
        let fields = header(&["", "id", "name", ""]);
        assert_eq!(
            ColumnMap::resolve(&["id", "name"], fields.clone(), HeaderPolicy::STRICT).unwrap_err(),
            HeaderMismatch::Extra(String::new())
        );
        let map = ColumnMap::resolve(&["id", "name"], fields, HeaderPolicy::IGNORE_EXTRA).unwrap();
        assert_eq!(map.physical(), &[None, Some(0), Some(1), None]);
    }

    #[test]
    fn test_resolve_missing_columns() {
        let fields = header(&["id"]);
        assert_eq!(
            ColumnMap::resolve(&["id", "name"], fields.clone(), HeaderPolicy::STRICT).unwrap_err(),
            HeaderMismatch::Missing("name".to_string())
        );
        let map =
            ColumnMap::resolve(&["id", "name"], fields, HeaderPolicy::IGNORE_MISSING).unwrap();
        assert!(map.has_column("id"));
        assert!(!map.has_column("name"));
        assert_eq!(map.physical(), &[Some(0)]);
    }

    #[test]
    fn test_resolve_duplicate() {
        let fields = header(&["id", "id"]);
        assert_eq!(
            ColumnMap::resolve(&["id"], fields, HeaderPolicy::IGNORE_EXTRA).unwrap_err(),
            HeaderMismatch::Duplicate("id".to_string())
        );
    }

    #[test]
    fn test_check_request() {
        assert!(ColumnMap::check_request(2, &["a", "b"]).is_ok());
        assert!(ColumnMap::check_request(2, &["a"]).is_err());
        assert!(ColumnMap::check_request(2, &["a", "a"]).is_err());
    }

    #[test]
    fn test_identity_and_in_order() {
        let map = ColumnMap::identity(3);
        assert_eq!(map.physical(), &[Some(0), Some(1), Some(2)]);
        assert_eq!(map.display_name(1), "#2");
        assert!(!map.has_column("a"));

        let map = ColumnMap::in_order(&["x", "y"]);
        assert!(map.has_column("y"));
        assert_eq!(map.display_name(1), "y");
    }
}
