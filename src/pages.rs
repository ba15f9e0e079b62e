use askama::Template;

use crate::feedback::{Feedback, FeedbackForm};
use crate::user::{Login, Registration, User};

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage<'a> {
    pub form: &'a Registration,
    pub errors: &'a [String],
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage<'a> {
    pub form: &'a Login,
    pub errors: &'a [String],
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage<'a> {
    pub user: &'a User,
    pub feedback: &'a [Feedback],
}

/// Add form when `id` is None, edit form otherwise.
#[derive(Template)]
#[template(path = "feedback.html")]
pub struct FeedbackPage<'a> {
    pub username: &'a str,
    pub id: Option<i64>,
    pub form: &'a FeedbackForm,
    pub errors: &'a [String],
}
