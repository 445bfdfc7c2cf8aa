//! Skill catalog loading.
//!
//! The catalog is a single JSON document produced by an external indexer:
//! `{"skills": [...]}`, optionally with `version`, `generated_at`, and
//! `skills_count`. A missing document is an empty catalog, not an error.

use crate::types::SkillRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read skill index {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid skill index {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// On-disk shape of the skill index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_count: Option<usize>,
    #[serde(default)]
    pub skills: Vec<SkillRecord>,
}

/// How the catalog was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// Loaded from the index document.
    Index,
    /// The index document does not exist.
    Missing,
}

/// Read-only, ordered collection of skills.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    skills: Vec<SkillRecord>,
    source: CatalogSource,
    /// Names dropped because an earlier record used them.
    duplicates: Vec<String>,
}

impl SkillCatalog {
    /// Build a catalog from records. Duplicate names keep the first record.
    pub fn new(records: Vec<SkillRecord>) -> Self {
        Self::with_source(records, CatalogSource::Index)
    }

    pub fn empty() -> Self {
        Self::with_source(Vec::new(), CatalogSource::Missing)
    }

    fn with_source(records: Vec<SkillRecord>, source: CatalogSource) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let mut skills = Vec::with_capacity(records.len());
        let mut duplicates = Vec::new();

        for record in records {
            if seen.insert(record.name.clone()) {
                skills.push(record);
            } else {
                duplicates.push(record.name);
            }
        }

        Self {
            skills,
            source,
            duplicates,
        }
    }

    /// Load the index document at `path`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::empty());
        }

        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content, path)
    }

    fn from_json(content: &str, path: &Path) -> Result<Self, CatalogError> {
        let index: SkillIndex =
            serde_json::from_str(content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(index.skills))
    }

    pub fn skills(&self) -> &[SkillRecord] {
        &self.skills
    }

    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_index_is_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = SkillCatalog::load(&dir.path().join("skill_index.json")).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.source(), CatalogSource::Missing);
    }

    #[test]
    fn loads_indexer_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skill_index.json");
        std::fs::write(
            &path,
            r#"{
  "version": "1.0.0",
  "generated_at": "2026-01-01T00:00:00",
  "skills_count": 2,
  "skills": [
    {"name": "react-deploy", "description": "Build and deploy React apps", "keywords": ["react", "deploy", "build"]},
    {"name": "code-review", "description": "Review code", "keywords": ["review"]}
  ]
}"#,
        )
        .unwrap();

        let catalog = SkillCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.source(), CatalogSource::Index);
        assert_eq!(catalog.skills()[0].name, "react-deploy");
        assert!(catalog.get("code-review").is_some());
    }

    #[test]
    fn malformed_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skill_index.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SkillCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn index_without_skills_key_is_empty() {
        let catalog = SkillCatalog::from_json("{}", Path::new("index.json")).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.source(), CatalogSource::Index);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let catalog = SkillCatalog::new(vec![
            SkillRecord::new("dup", "first", ["a"]),
            SkillRecord::new("dup", "second", ["b"]),
            SkillRecord::new("other", "x", ["c"]),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("dup").unwrap().description, "first");
        assert_eq!(catalog.duplicates(), ["dup".to_string()]);
    }
}
