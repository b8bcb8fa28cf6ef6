//! Article record.
//!
//! # Invariants
//! - `title` is required with 10..=30 characters.
//! - `text` is required with at least 20 characters.
//! - `comments` is only populated by explicit eager-load calls.

use super::comment::Comment;
use super::validation::{FieldConstraint, Validatable};
use super::RecordId;
use serde::{Deserialize, Serialize};

// Upper bound of a LONGTEXT column in the legacy schema.
const TEXT_MAX_CHARS: usize = u32::MAX as usize;

const ARTICLE_RULES: &[FieldConstraint] = &[
    FieldConstraint::required("title").min_len(10).max_len(30),
    FieldConstraint::required("text")
        .min_len(20)
        .max_len(TEXT_MAX_CHARS),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

impl Article {
    /// Builds an unsaved article.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}

impl Validatable for Article {
    const KIND: &'static str = "article";

    fn constraints() -> &'static [FieldConstraint] {
        ARTICLE_RULES
    }

    fn field_text(&self, field: &str) -> Option<&str> {
        match field {
            "title" => Some(&self.title),
            "text" => Some(&self.text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Article;
    use crate::model::validation::{validate, Violation};

    #[test]
    fn short_title_is_rejected() {
        let article = Article::new("Hello", "a body that is long enough to pass");
        let err = validate(&article).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::TooShort {
                field: "title",
                min: 10,
                actual: 5
            }]
        );
    }

    #[test]
    fn valid_article_passes() {
        validate(&Article::new(
            "A proper title",
            "a body that is long enough to pass",
        ))
        .unwrap();
    }
}
