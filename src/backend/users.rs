use log::error;
use sqlx::{query, query_as};

use super::{insert_error, Backend, FindError, InsertError};
use crate::user::User;

impl Backend {
    /// A single INSERT: uniqueness of username and email is the table's job,
    /// so racing registrations can't both get in.
    pub async fn insert_user(&self, user: &User) -> Result<(), InsertError> {
        query(
            "
            INSERT INTO users
            (username, pwhash, email, first_name, last_name)
            VALUES
            (?, ?, ?, ?, ?)
            ",
        )
        .bind(&user.username)
        .bind(&user.pwhash)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(insert_error)
    }

    pub async fn find_user(&self, username: &str) -> Result<User, FindError> {
        query_as::<_, User>(
            "
            SELECT username, pwhash, email, first_name, last_name
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query user {username}: {e:?}");
            FindError::Internal
        })?
        .ok_or(FindError::NotFound)
    }
}
