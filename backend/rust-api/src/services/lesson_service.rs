use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::catalog::{CategoryWithLessons, Lesson, LessonDetail, LessonSummary};
use crate::progression::{is_visible, visible_difficulties, LessonCompletionRecord, SkillLevel};
use crate::services::AppState;

pub struct LessonService<'a> {
    state: &'a AppState,
}

impl<'a> LessonService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Categories in display order, each with the active lessons the caller's
    /// skill level allows. Categories left without lessons are omitted.
    pub async fn list_catalog(&self, user_id: &str) -> AppResult<Vec<CategoryWithLessons>> {
        let user = self.state.load_user(user_id).await?;
        let difficulties: Vec<_> = visible_difficulties(user.progression.skill_level)
            .into_iter()
            .collect();

        let categories = self.state.store.list_categories().await?;
        let lessons = self.state.store.list_lessons(&difficulties).await?;
        let records: HashMap<String, LessonCompletionRecord> = self
            .state
            .store
            .list_completions(user_id)
            .await?
            .into_iter()
            .map(|record| (record.lesson_id.clone(), record))
            .collect();

        let mut by_category: HashMap<&str, Vec<LessonSummary>> = HashMap::new();
        for lesson in &lessons {
            by_category
                .entry(lesson.category_id.as_str())
                .or_default()
                .push(LessonSummary::new(lesson, records.get(&lesson.id)));
        }

        let listing = categories
            .into_iter()
            .filter_map(|category| {
                let lessons = by_category.remove(category.id.as_str())?;
                Some(CategoryWithLessons {
                    id: category.id,
                    name: category.name,
                    description: category.description,
                    order: category.order,
                    lessons,
                })
            })
            .collect();

        Ok(listing)
    }

    pub async fn get_lesson(&self, user_id: &str, lesson_id: &str) -> AppResult<LessonDetail> {
        let user = self.state.load_user(user_id).await?;
        let lesson = self.accessible_lesson(lesson_id, user.progression.skill_level).await?;
        let record = self.state.store.find_completion(user_id, lesson_id).await?;

        Ok(LessonDetail::new(lesson, record.as_ref()))
    }

    /// Active lesson the caller is allowed to open.
    pub async fn accessible_lesson(
        &self,
        lesson_id: &str,
        skill_level: SkillLevel,
    ) -> AppResult<Lesson> {
        let lesson = self
            .state
            .store
            .find_lesson(lesson_id)
            .await?
            .filter(|lesson| lesson.is_active)
            .ok_or_else(|| AppError::not_found("Lesson", lesson_id))?;

        if !is_visible(skill_level, lesson.difficulty) {
            tracing::debug!(
                lesson_id,
                difficulty = %lesson.difficulty,
                skill_level = %skill_level,
                "Lesson above caller's skill level"
            );
            return Err(AppError::Forbidden(format!(
                "Lesson {} requires {} level",
                lesson_id, lesson.difficulty
            )));
        }

        Ok(lesson)
    }
}
