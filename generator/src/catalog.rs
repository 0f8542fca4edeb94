//! Scenario catalog: the flavor data blocks draw names, topics and payload
//! values from.
//!
//! A built-in catalog is compiled in; `TRANSCRIPT_CATALOG_PATH` may point at a
//! TOML file with the same shape to replace it.

use std::path::Path;

use rand::Rng;
use serde::Deserialize;

const BUILTIN_CATALOG_TOML: &str = include_str!("../config/scenario-catalog.toml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to parse scenario catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Scenario catalog list '{0}' is empty")]
    EmptyList(&'static str),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioCatalog {
    pub callers: Vec<String>,
    pub departments: Vec<String>,
    pub knowledge_topics: Vec<String>,
    pub benefit_types: Vec<String>,
    pub benefit_plans: Vec<String>,
    pub order_statuses: Vec<String>,
    pub payroll_months: Vec<String>,
    pub small_talk_prompts: Vec<String>,
    pub small_talk_replies: Vec<String>,
}

impl ScenarioCatalog {
    pub fn built_in() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG_TOML)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self = toml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let lists: [(&'static str, &Vec<String>); 9] = [
            ("callers", &self.callers),
            ("departments", &self.departments),
            ("knowledge_topics", &self.knowledge_topics),
            ("benefit_types", &self.benefit_types),
            ("benefit_plans", &self.benefit_plans),
            ("order_statuses", &self.order_statuses),
            ("payroll_months", &self.payroll_months),
            ("small_talk_prompts", &self.small_talk_prompts),
            ("small_talk_replies", &self.small_talk_replies),
        ];
        match lists.iter().find(|(_, list)| list.is_empty()) {
            Some((name, _)) => Err(CatalogError::EmptyList(name)),
            None => Ok(()),
        }
    }
}

/// Load the catalog override at `path`, falling back to the built-in catalog
/// when the file is missing or malformed.
pub fn load_catalog(path: Option<&Path>) -> Result<ScenarioCatalog, CatalogError> {
    let Some(path) = path else {
        return ScenarioCatalog::built_in();
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to read scenario catalog; using built-in catalog"
            );
            return ScenarioCatalog::built_in();
        }
    };

    ScenarioCatalog::from_toml(&content).or_else(|err| {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "Invalid scenario catalog; using built-in catalog"
        );
        ScenarioCatalog::built_in()
    })
}

/// Uniformly pick one entry. Empty lists yield an empty string.
pub fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &'a [String]) -> &'a str {
    if items.is_empty() {
        return "";
    }
    &items[rng.random_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_built_in_catalog_parses() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        assert_eq!(catalog.callers.len(), 20);
        assert_eq!(catalog.knowledge_topics.len(), 10);
        assert_eq!(catalog.departments.len(), 4);
    }

    #[test]
    fn test_empty_list_rejected() {
        let raw = BUILTIN_CATALOG_TOML.replace(
            "benefit_plans = [\"premium\", \"standard\", \"basic\"]",
            "benefit_plans = []",
        );
        let err = ScenarioCatalog::from_toml(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyList("benefit_plans")));
    }

    #[test]
    fn test_missing_override_falls_back() {
        let catalog = load_catalog(Some(Path::new("/nonexistent/catalog.toml"))).unwrap();
        assert_eq!(catalog, ScenarioCatalog::built_in().unwrap());
    }

    #[test]
    fn test_pick_stays_in_list() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let name = pick(&mut rng, &catalog.callers);
            assert!(catalog.callers.iter().any(|c| c == name));
        }
        assert_eq!(pick(&mut rng, &[]), "");
    }
}
