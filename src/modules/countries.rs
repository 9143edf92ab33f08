use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Origin of a solver, shown next to a notification when country details are enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

pub trait CountryMapping: Send + Sync {
    fn map(&self, raw: Option<&str>) -> Option<Country>;
}

pub struct TableCountryMapping {
    table: BTreeMap<String, Country>,
}

impl TableCountryMapping {
    pub fn new(table: BTreeMap<String, Country>) -> Self {
        Self { table }
    }
}

impl CountryMapping for TableCountryMapping {
    fn map(&self, raw: Option<&str>) -> Option<Country> {
        let raw = raw?.trim();
        if raw.is_empty() { return None; }
        self.table.get(raw).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> TableCountryMapping {
        let mut table = BTreeMap::new();
        table.insert("scoreBoardChallenge".to_string(), Country { code: "CA".into(), name: "Canada".into() });
        TableCountryMapping::new(table)
    }

    #[test]
    fn test_known_value_maps_to_country() {
        let country = mapping().map(Some("scoreBoardChallenge")).unwrap();
        assert_eq!(country.code, "CA");
        assert_eq!(country.name, "Canada");
    }

    #[test]
    fn test_unknown_or_missing_value_maps_to_none() {
        let m = mapping();
        assert!(m.map(Some("nope")).is_none());
        assert!(m.map(Some("  ")).is_none());
        assert!(m.map(None).is_none());
    }
}
