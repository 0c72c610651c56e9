use crate::pipeline::paths::{escape_branch_name, facet_branch_names};
use crate::schema::{ClassDefinition, SearchableClass, SearchableClasses};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads searchable class definitions from a directory of YAML files.
pub struct ClassLoader {
    classes_dir: PathBuf,
}

impl ClassLoader {
    pub fn new(classes_dir: impl AsRef<Path>) -> Self {
        Self {
            classes_dir: classes_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load_all(&self) -> Result<SearchableClasses> {
        let mut classes = HashMap::new();

        if !self.classes_dir.exists() {
            return Err(Error::Schema(format!(
                "Classes directory does not exist: {}",
                self.classes_dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.classes_dir)? {
            let path = entry?.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => paths.push(path),
                _ => continue,
            }
        }
        paths.sort();

        for path in paths {
            let definition = self.load_class(&path)?;
            if classes.contains_key(&definition.class_name) {
                return Err(Error::Schema(format!(
                    "Class '{}' is defined more than once (last seen in {})",
                    definition.class_name,
                    path.display()
                )));
            }
            classes.insert(definition.class_name, definition.class);
        }

        Ok(classes)
    }

    pub fn load_class(&self, path: &Path) -> Result<ClassDefinition> {
        let content = fs::read_to_string(path)?;
        let definition: ClassDefinition = serde_yaml::from_str(&content)?;
        Ok(definition)
    }

    /// Lint a single class and return a list of human-readable issues (empty = ok)
    pub fn lint_class(class: &SearchableClass) -> Vec<String> {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        for facet in &class.facetable_fields {
            if facet.key.trim().is_empty() {
                issues.push("facetable_fields contains an empty key".to_string());
            } else if facet.is_id() {
                issues.push(format!(
                    "facet key '{}' is the resource identifier and cannot be faceted",
                    facet.key
                ));
            } else if !seen.insert(facet.key.as_str()) {
                issues.push(format!("facet key '{}' is configured more than once", facet.key));
            }
        }

        // branch names are de-duplicated by the compiler, but a collision means two
        // facets share a display name that users cannot tell apart either
        let names = facet_branch_names(&class.facetable_fields);
        for (facet, branch) in class.facetable_fields.iter().zip(&names) {
            let escaped = escape_branch_name(&facet.display_name());
            if *branch != escaped {
                issues.push(format!(
                    "facet '{}' has a name that collides with another output after escaping ('{}')",
                    facet.key, escaped
                ));
            }
        }

        for field in &class.selected_fields {
            if field.key.trim().is_empty() {
                issues.push("selected_fields contains an empty key".to_string());
            }
        }

        issues
    }

    /// Lint all loaded classes and return map class name -> issues
    pub fn lint_all(classes: &SearchableClasses) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        for (name, class) in classes {
            let issues = ClassLoader::lint_class(class);
            if !issues.is_empty() {
                map.insert(name.clone(), issues);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldLabel;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_classes_from_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let classes_dir = temp.path();

        fs::write(
            classes_dir.join("dataset.yaml"),
            r#"
class_name: Dataset
description: Dataset with embedded references
facetable_fields:
  - key: type
    name: Type
  - key: study.type
selected_fields:
  - key: title
"#,
        )?;
        fs::write(classes_dir.join("README.md"), "not a class")?;

        let loader = ClassLoader::new(classes_dir);
        let classes = loader.load_all()?;

        assert_eq!(classes.len(), 1);
        let dataset = &classes["Dataset"];
        assert_eq!(dataset.facetable_fields.len(), 2);
        assert_eq!(dataset.facetable_fields[1].key, "study.type");
        assert_eq!(dataset.selected_fields[0].key, "title");

        Ok(())
    }

    #[test]
    fn test_duplicate_class_is_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        let class = "class_name: Sample\ndescription: Samples\n";
        fs::write(temp.path().join("a.yaml"), class)?;
        fs::write(temp.path().join("b.yml"), class)?;

        let err = ClassLoader::new(temp.path()).load_all().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let err = ClassLoader::new("/definitely/not/here").load_all().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_lint_reports_duplicate_keys_and_name_collisions() {
        let class = SearchableClass {
            description: "Broken".to_string(),
            facetable_fields: vec![
                FieldLabel::new("type"),
                FieldLabel::new("type"),
                FieldLabel::named("study.type", "Study Type"),
                FieldLabel::named("study_type", "Study.Type"),
            ],
            selected_fields: vec![],
        };

        let issues = ClassLoader::lint_class(&class);
        assert!(issues.iter().any(|i| i.contains("configured more than once")));
        assert!(issues.iter().any(|i| i.contains("'study_type'")));
    }

    #[test]
    fn test_lint_rejects_identifier_facet() {
        let class = SearchableClass {
            description: "Animals".to_string(),
            facetable_fields: vec![FieldLabel::new("species"), FieldLabel::id()],
            selected_fields: vec![],
        };

        let issues = ClassLoader::lint_class(&class);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("resource identifier"));
    }

    #[test]
    fn test_lint_clean_class() {
        let class = SearchableClass {
            description: "Animals".to_string(),
            facetable_fields: vec![FieldLabel::new("species"), FieldLabel::named("eats", "Food")],
            selected_fields: vec![FieldLabel::id(), FieldLabel::new("name")],
        };
        assert!(ClassLoader::lint_class(&class).is_empty());
    }
}
