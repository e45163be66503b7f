use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{connection::Database, helpers::parse_datetime, models::User};

fn row_to_user(row: &Row) -> Result<User> {
    let created_at: String = row.get("created_at")?;
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password_hash, created_at
                 FROM users
                 WHERE username = ?1",
            )?;
            let row = stmt
                .query_row(params![username], |row| Ok(row_to_user(row)))
                .optional()?;
            row.transpose()
        })
        .await
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if exists {
                bail!("user {username} already exists");
            }

            let created_at = Utc::now();
            tx.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, created_at.to_rfc3339()],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(User {
                id,
                username,
                password_hash,
                created_at,
            })
        })
        .await
    }
}
