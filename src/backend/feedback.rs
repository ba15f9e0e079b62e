use log::{error, info};
use sqlx::{query, query_as};

use super::{Backend, FindError, Result};
use crate::feedback::Feedback;

impl Backend {
    pub async fn create_feedback(
        &self,
        username: &str,
        title: &str,
        content: &str,
    ) -> Result<Feedback> {
        let id = query(
            "
            INSERT INTO feedback
            (title, content, username)
            VALUES
            (?, ?, ?)
            ",
        )
        .bind(title)
        .bind(content)
        .bind(username)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting feedback for {username}: {e:?}");
        })?
        .last_insert_rowid();

        info!("{username} created feedback {id}");

        Ok(Feedback {
            id,
            title: title.into(),
            content: content.into(),
            username: username.into(),
        })
    }

    pub async fn find_feedback(&self, id: i64) -> std::result::Result<Feedback, FindError> {
        query_as::<_, Feedback>(
            "
            SELECT id, title, content, username
            FROM feedback
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query feedback {id}: {e:?}");
            FindError::Internal
        })?
        .ok_or(FindError::NotFound)
    }

    pub async fn feedback_for_user(&self, username: &str) -> Result<Vec<Feedback>> {
        query_as::<_, Feedback>(
            "
            SELECT id, title, content, username
            FROM feedback
            WHERE username = ?
            ORDER BY id
            ",
        )
        .bind(username)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting feedback for {username}: {e:?}");
        })
    }

    /// Only touches the row if `username` still owns it.
    pub async fn update_feedback(
        &self,
        id: i64,
        username: &str,
        title: &str,
        content: &str,
    ) -> std::result::Result<Feedback, FindError> {
        let updated = query(
            "
            UPDATE feedback
            SET title = ?, content = ?
            WHERE id = ? AND username = ?
            ",
        )
        .bind(title)
        .bind(content)
        .bind(id)
        .bind(username)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("error updating feedback {id}: {e:?}");
            FindError::Internal
        })?
        .rows_affected();

        if updated == 0 {
            return Err(FindError::NotFound);
        }

        info!("{username} updated feedback {id}");

        Ok(Feedback {
            id,
            title: title.into(),
            content: content.into(),
            username: username.into(),
        })
    }
}
