use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Resource;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOption {
    pub value: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub key: String,
    pub name: String,
    pub options: Vec<FacetOption>,
}

/// Hits, total hit count and facet distributions of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    #[serde(default)]
    pub facets: Vec<Facet>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub hits: Vec<Resource>,
}

impl QueryResults {
    /// Validate the reshaped aggregation output against the results model.
    pub fn from_aggregation(raw: Value) -> Result<Self> {
        let results: QueryResults =
            serde_json::from_value(raw).map_err(|e| Error::Validation(e.to_string()))?;
        results.validate()?;
        Ok(results)
    }

    pub fn validate(&self) -> Result<()> {
        for facet in &self.facets {
            if let Some(option) = facet.options.iter().find(|o| o.count == 0) {
                return Err(Error::Validation(format!(
                    "facet '{}' has option {:?} with a count of zero",
                    facet.key, option.value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_aggregation() {
        let raw = json!({
            "hits": [{"id_": "1", "content": {"species": "cat"}}],
            "count": 1,
            "facets": [{
                "key": "species",
                "name": "Species",
                "options": [{"value": "cat", "count": 1}]
            }]
        });

        let results = QueryResults::from_aggregation(raw).unwrap();
        assert_eq!(results.count, 1);
        assert_eq!(results.hits[0].id, "1");
        assert_eq!(results.facets[0].options[0].value.as_deref(), Some("cat"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let results = QueryResults::from_aggregation(json!({})).unwrap();
        assert_eq!(results, QueryResults::default());
    }

    #[test]
    fn test_non_string_facet_value_fails_validation() {
        let raw = json!({
            "hits": [],
            "count": 0,
            "facets": [{"key": "age", "name": "Age", "options": [{"value": 4, "count": 1}]}]
        });
        let err = QueryResults::from_aggregation(raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_hit_without_content_fails_validation() {
        let raw = json!({"hits": [{"id_": "1"}], "count": 1, "facets": []});
        assert!(matches!(
            QueryResults::from_aggregation(raw),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_zero_count_option_fails_validation() {
        let raw = json!({
            "count": 0,
            "facets": [{"key": "k", "name": "K", "options": [{"value": "v", "count": 0}]}]
        });
        assert!(matches!(
            QueryResults::from_aggregation(raw),
            Err(Error::Validation(_))
        ));
    }
}
