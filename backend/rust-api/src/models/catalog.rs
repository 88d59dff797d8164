use serde::{Deserialize, Serialize};

use crate::progression::{Difficulty, LessonCompletionRecord, LessonMetadata, Score};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub order: u32,
}

/// Lesson stored in the "lessons" collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub content: LessonContent,
    pub difficulty: Difficulty,
    pub estimated_time_minutes: u32,
    pub order: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("lesson has no content sections")]
    Empty,
    #[error("section {0} has blank text")]
    BlankText(usize),
    #[error("section {0} has no steps")]
    NoSteps(usize),
    #[error("quiz question {0} has fewer than two options")]
    TooFewOptions(String),
    #[error("quiz question {0} has a correct answer that is not one of its options")]
    AnswerNotAnOption(String),
    #[error("estimated time must be positive")]
    ZeroDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("lesson has no quiz; submit a score instead")]
    NoQuiz,
    #[error("expected {expected} answers, got {actual}")]
    AnswerCount { expected: usize, actual: usize },
}

impl Lesson {
    pub fn metadata(&self) -> LessonMetadata {
        LessonMetadata {
            estimated_time_minutes: self.estimated_time_minutes,
            difficulty: self.difficulty,
        }
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        if self.estimated_time_minutes == 0 {
            return Err(ContentError::ZeroDuration);
        }
        self.content.validate()?;
        for question in &self.quiz {
            if question.options.len() < 2 {
                return Err(ContentError::TooFewOptions(question.id.clone()));
            }
            if !question.options.contains(&question.correct_answer) {
                return Err(ContentError::AnswerNotAnOption(question.id.clone()));
            }
        }
        Ok(())
    }

    /// Quiz questions in presentation order.
    pub fn ordered_quiz(&self) -> Vec<&QuizQuestion> {
        let mut questions: Vec<&QuizQuestion> = self.quiz.iter().collect();
        questions.sort_by_key(|q| q.order);
        questions
    }

    /// Grades positional answers against the quiz: `round(correct / total * 100)`.
    pub fn grade_quiz(&self, answers: &[String]) -> Result<Score, QuizError> {
        let questions = self.ordered_quiz();
        if questions.is_empty() {
            return Err(QuizError::NoQuiz);
        }
        if answers.len() != questions.len() {
            return Err(QuizError::AnswerCount {
                expected: questions.len(),
                actual: answers.len(),
            });
        }

        let correct = questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.correct_answer == answer.trim())
            .count();
        Ok(Score::from_ratio(correct, questions.len()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    pub sections: Vec<ContentSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSection {
    Heading { text: String },
    Text { content: String },
    Steps { items: Vec<String> },
    Tip { content: String },
    Image { url: String, alt: String },
}

impl LessonContent {
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.sections.is_empty() {
            return Err(ContentError::Empty);
        }

        for (index, section) in self.sections.iter().enumerate() {
            let blank = match section {
                ContentSection::Heading { text } => text.trim().is_empty(),
                ContentSection::Text { content } | ContentSection::Tip { content } => {
                    content.trim().is_empty()
                }
                ContentSection::Image { url, .. } => url.trim().is_empty(),
                ContentSection::Steps { items } => {
                    if items.is_empty() {
                        return Err(ContentError::NoSteps(index));
                    }
                    items.iter().any(|item| item.trim().is_empty())
                }
            };
            if blank {
                return Err(ContentError::BlankText(index));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub order: u32,
}

/// Quiz question as shown to learners, without the answer.
#[derive(Debug, Serialize)]
pub struct QuizQuestionView {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub order: u32,
}

impl From<&QuizQuestion> for QuizQuestionView {
    fn from(question: &QuizQuestion) -> Self {
        Self {
            id: question.id.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
            order: question.order,
        }
    }
}

/// Caller's state for one lesson.
#[derive(Debug, Serialize)]
pub struct LessonProgressView {
    pub completed: bool,
    pub score: u8,
    pub best_score: u8,
    pub attempts: u32,
    pub xp_earned: u32,
}

impl From<&LessonCompletionRecord> for LessonProgressView {
    fn from(record: &LessonCompletionRecord) -> Self {
        Self {
            completed: record.completed,
            score: record.score.value(),
            best_score: record.best_score.value(),
            attempts: record.attempts,
            xp_earned: record.xp_earned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_time_minutes: u32,
    pub order: u32,
    pub has_quiz: bool,
    pub progress: Option<LessonProgressView>,
}

impl LessonSummary {
    pub fn new(lesson: &Lesson, record: Option<&LessonCompletionRecord>) -> Self {
        Self {
            id: lesson.id.clone(),
            title: lesson.title.clone(),
            description: lesson.description.clone(),
            difficulty: lesson.difficulty,
            estimated_time_minutes: lesson.estimated_time_minutes,
            order: lesson.order,
            has_quiz: !lesson.quiz.is_empty(),
            progress: record.map(LessonProgressView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryWithLessons {
    pub id: String,
    pub name: String,
    pub description: String,
    pub order: u32,
    pub lessons: Vec<LessonSummary>,
}

#[derive(Debug, Serialize)]
pub struct LessonDetail {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_time_minutes: u32,
    pub content: LessonContent,
    pub quiz: Vec<QuizQuestionView>,
    pub progress: Option<LessonProgressView>,
}

impl LessonDetail {
    pub fn new(lesson: Lesson, record: Option<&LessonCompletionRecord>) -> Self {
        let quiz = lesson
            .ordered_quiz()
            .into_iter()
            .map(QuizQuestionView::from)
            .collect();
        Self {
            id: lesson.id,
            category_id: lesson.category_id,
            title: lesson.title,
            description: lesson.description,
            difficulty: lesson.difficulty,
            estimated_time_minutes: lesson.estimated_time_minutes,
            content: lesson.content,
            quiz,
            progress: record.map(LessonProgressView::from),
        }
    }
}
