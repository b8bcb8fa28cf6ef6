//! Comment record, owned by one article through `article_id`.

use super::validation::{FieldConstraint, Validatable};
use super::RecordId;
use serde::{Deserialize, Serialize};

const COMMENT_RULES: &[FieldConstraint] = &[
    FieldConstraint::required("commenter"),
    FieldConstraint::required("body").min_len(20),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: RecordId,
    pub commenter: String,
    #[serde(default)]
    pub body: String,
    /// Owning article; 0 when detached.
    #[serde(default)]
    pub article_id: RecordId,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Comment {
    pub fn new(
        article_id: RecordId,
        commenter: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            article_id,
            commenter: commenter.into(),
            body: body.into(),
            ..Self::default()
        }
    }
}

impl Validatable for Comment {
    const KIND: &'static str = "comment";

    fn constraints() -> &'static [FieldConstraint] {
        COMMENT_RULES
    }

    fn field_text(&self, field: &str) -> Option<&str> {
        match field {
            "commenter" => Some(&self.commenter),
            "body" => Some(&self.body),
            _ => None,
        }
    }
}
