use std::future::Future;
use std::path::{Path, PathBuf};

use log::{error, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite, Transaction,
};

use crate::user::UniqueField;

mod feedback;
mod sessions;
mod users;

type Result<T> = std::result::Result<T, ()>;

#[derive(Debug, PartialEq, Eq)]
pub enum FindError {
    NotFound,
    Internal,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertError {
    Duplicate(UniqueField),
    Internal,
}

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("feedback.sql")
}

impl Backend {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let db_path = into_sql(data_dir);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("couldn't open {db_path:?}: {e}");
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                error!("migration: {e}");
            })?;

        info!("Using {}", db_path.display());

        Ok(Self(pool))
    }
}

impl Backend {
    async fn transact<'t, T, R, F>(&self, transaction: T) -> Result<R>
    where
        T: FnOnce(Transaction<'t, Sqlite>) -> F,
        F: Future<Output = Result<(Transaction<'t, Sqlite>, R)>>,
    {
        let tx = self.0.begin().await.map_err(|e| {
            error!("error beginning transaction: {:?}", e);
        })?;

        let (tx, r) = transaction(tx).await?;

        tx.commit().await.map_err(|e| {
            error!("error committing transaction: {:?}", e);
        })?;

        Ok(r)
    }
}

// SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE
const UNIQUE_VIOLATIONS: [&str; 2] = ["1555", "2067"];

fn insert_error(e: sqlx::Error) -> InsertError {
    if let sqlx::Error::Database(ref db_err) = e {
        let unique = db_err
            .code()
            .map_or(false, |code| UNIQUE_VIOLATIONS.contains(&&*code));

        if unique {
            // "UNIQUE constraint failed: users.email"
            let field = if db_err.message().contains("users.email") {
                UniqueField::Email
            } else {
                UniqueField::Username
            };
            return InsertError::Duplicate(field);
        }
    }

    error!("insert: {e:?}");
    InsertError::Internal
}
