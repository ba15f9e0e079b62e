use serde::Deserialize;
use validator::Validate;

use crate::form::{self, FormErrors};

#[derive(Debug, Clone)]
#[derive(sqlx::FromRow)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Feedback {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// owner
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct FeedbackForm {
    #[validate(length(max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    pub content: String,
}

impl FeedbackForm {
    pub fn check(&self) -> Result<(), FormErrors> {
        form::check(self, |errors| {
            form::required(errors, "title", &self.title, "Title must be 1-100 characters");
            form::required(errors, "content", &self.content, "Content is required");
        })
    }
}

impl From<&Feedback> for FeedbackForm {
    fn from(feedback: &Feedback) -> Self {
        Self {
            title: feedback.title.clone(),
            content: feedback.content.clone(),
        }
    }
}
