use log::{error, info};
use sqlx::{query, query_as};

use super::{Backend, FindError, Result};
use crate::time::Timestamp;

#[derive(Debug, sqlx::FromRow)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct StoredSession {
    pub username: String,
    pub created: Timestamp,
}

impl Backend {
    /// Drop `previous` (if any) and any session created before `cutoff`,
    /// then record `session_id` for `username`.
    pub async fn start_session(
        &self,
        previous: Option<&str>,
        session_id: &str,
        username: &str,
        now: Timestamp,
        cutoff: Timestamp,
    ) -> Result<()> {
        let expired = self
            .transact(|mut tx| async move {
                if let Some(previous) = previous {
                    query("DELETE FROM sessions WHERE id = ?")
                        .bind(previous)
                        .execute(&mut tx)
                        .await
                        .map_err(|e| {
                            error!("error removing previous session: {e:?}");
                        })?;
                }

                let expired = query("DELETE FROM sessions WHERE created < ?")
                    .bind(cutoff)
                    .execute(&mut tx)
                    .await
                    .map_err(|e| {
                        error!("error sweeping sessions: {e:?}");
                    })?
                    .rows_affected();

                query(
                    "
                    INSERT INTO sessions
                    (id, username, created)
                    VALUES
                    (?, ?, ?)
                    ",
                )
                .bind(session_id)
                .bind(username)
                .bind(now)
                .execute(&mut tx)
                .await
                .map_err(|e| {
                    error!("error inserting session: {e:?}");
                })?;

                Ok((tx, expired))
            })
            .await?;

        if expired > 0 {
            info!("swept {expired} expired sessions");
        }

        Ok(())
    }

    pub async fn find_session(
        &self,
        session_id: &str,
    ) -> std::result::Result<StoredSession, FindError> {
        query_as::<_, StoredSession>(
            "
            SELECT username, created
            FROM sessions
            WHERE id = ?
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for session {session_id}: {e:?}");
            FindError::Internal
        })?
        .ok_or(FindError::NotFound)
    }

    /// Returns whether there was anything to delete.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.0)
            .await
            .map(|r| r.rows_affected() > 0)
            .map_err(|e| {
                error!("couldn't delete session {session_id}: {e:?}");
            })
    }
}
