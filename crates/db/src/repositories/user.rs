use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::user::{UserAccount, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, preferred_language FROM user_account WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn save(&self, user: UserAccount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_account (id, name, email, phone, preferred_language)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                preferred_language = excluded.preferred_language",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.phone.as_deref())
        .bind(&user.preferred_language)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn user_from_row(row: SqliteRow) -> UserAccount {
    UserAccount {
        id: UserId(row.get::<String, _>("id")),
        name: row.get::<String, _>("name"),
        email: row.get::<String, _>("email"),
        phone: row.get::<Option<String>, _>("phone"),
        preferred_language: row.get::<String, _>("preferred_language"),
    }
}
