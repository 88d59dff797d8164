use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

use crate::models::catalog::{Category, ContentError, Lesson};
use crate::progression::{BadgeCondition, BadgeDefinition};
use crate::repositories::LearningStore;

const DEFAULT_CATALOG: &str = include_str!("../../catalog/default_catalog.json");

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub categories: Vec<Category>,
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub badges: Vec<BadgeDefinition>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("lesson {lesson_id}: {source}")]
    InvalidLesson {
        lesson_id: String,
        source: ContentError,
    },
    #[error("lesson {lesson_id} references unknown category {category_id}")]
    UnknownCategory {
        lesson_id: String,
        category_id: String,
    },
    #[error("duplicate id {0}")]
    DuplicateId(String),
    #[error("badge {badge_id} references unknown lesson {lesson_id}")]
    UnknownBadgeLesson { badge_id: String, lesson_id: String },
}

impl CatalogFile {
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut category_ids = HashSet::new();
        for category in &self.categories {
            if !category_ids.insert(category.id.as_str()) {
                return Err(CatalogError::DuplicateId(category.id.clone()));
            }
        }

        let mut lesson_ids = HashSet::new();
        for lesson in &self.lessons {
            if !lesson_ids.insert(lesson.id.as_str()) {
                return Err(CatalogError::DuplicateId(lesson.id.clone()));
            }
            if !category_ids.contains(lesson.category_id.as_str()) {
                return Err(CatalogError::UnknownCategory {
                    lesson_id: lesson.id.clone(),
                    category_id: lesson.category_id.clone(),
                });
            }
            lesson
                .validate()
                .map_err(|source| CatalogError::InvalidLesson {
                    lesson_id: lesson.id.clone(),
                    source,
                })?;
        }

        let mut badge_ids = HashSet::new();
        for badge in &self.badges {
            if !badge_ids.insert(badge.id.as_str()) {
                return Err(CatalogError::DuplicateId(badge.id.clone()));
            }
            if let BadgeCondition::LessonSet { lesson_ids: required } = &badge.condition {
                if let Some(missing) = required.iter().find(|id| !lesson_ids.contains(id.as_str())) {
                    return Err(CatalogError::UnknownBadgeLesson {
                        badge_id: badge.id.clone(),
                        lesson_id: missing.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

pub fn parse_catalog(contents: &str) -> Result<CatalogFile, CatalogError> {
    let catalog: CatalogFile = serde_json::from_str(contents)?;
    catalog.validate()?;
    Ok(catalog)
}

/// Loads `path` when given, otherwise the catalog bundled into the binary.
pub async fn load_catalog(path: Option<&str>) -> Result<CatalogFile> {
    match path.filter(|p| !p.is_empty()) {
        Some(path) => {
            let path = Path::new(path);
            tracing::info!("Loading catalog from {}", path.display());
            let contents = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
            parse_catalog(&contents).context("Invalid catalog file")
        }
        None => {
            tracing::debug!("Loading bundled catalog");
            parse_catalog(DEFAULT_CATALOG).context("Invalid bundled catalog")
        }
    }
}

/// Upserts every category, lesson and badge. Safe to rerun.
pub async fn seed_catalog(store: &dyn LearningStore, catalog: &CatalogFile) -> Result<()> {
    for category in &catalog.categories {
        store
            .upsert_category(category)
            .await
            .with_context(|| format!("Failed to upsert category {}", category.id))?;
    }
    for lesson in &catalog.lessons {
        store
            .upsert_lesson(lesson)
            .await
            .with_context(|| format!("Failed to upsert lesson {}", lesson.id))?;
    }
    for badge in &catalog.badges {
        store
            .upsert_badge(badge)
            .await
            .with_context(|| format!("Failed to upsert badge {}", badge.id))?;
    }

    tracing::info!(
        categories = catalog.categories.len(),
        lessons = catalog.lessons.len(),
        badges = catalog.badges.len(),
        "Catalog seeded"
    );
    Ok(())
}
