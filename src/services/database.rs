use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::models::{FoodEntry, User};

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Database { pool };
        db.init_tables().await?;
        Ok(db)
    }

    /// Pool that only connects on first use. Nothing is created up front.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        Ok(Database { pool })
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                password_updated_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS foods (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                calories INTEGER NOT NULL,
                protein DOUBLE PRECISION NOT NULL,
                eaten_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_foods_user_eaten_at ON foods (user_id, eaten_at DESC)")
            .execute(&self.pool)
            .await?;

        log::info!("✅ Database tables ready");
        Ok(())
    }

    /// Inserts the user. Returns `false` if the username is already taken.
    pub async fn create_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at, password_updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.password_updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query(
            r#"
            SELECT id, username, password_hash, created_at, password_updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| user_from_row(&row));

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query(
            r#"
            SELECT id, username, password_hash, created_at, password_updated_at
            FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| user_from_row(&row));

        Ok(user)
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, password_updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn add_food(&self, food: &FoodEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO foods (id, user_id, name, calories, protein, eaten_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(food.id)
        .bind(food.user_id)
        .bind(&food.name)
        .bind(food.calories)
        .bind(food.protein)
        .bind(food.eaten_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All entries of a user, newest first.
    pub async fn get_foods(&self, user_id: Uuid) -> Result<Vec<FoodEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, calories, protein, eaten_at
            FROM foods
            WHERE user_id = $1
            ORDER BY eaten_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(food_from_row).collect())
    }

    /// Entries with `from <= eaten_at < to`, newest first.
    pub async fn get_foods_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FoodEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, calories, protein, eaten_at
            FROM foods
            WHERE user_id = $1 AND eaten_at >= $2 AND eaten_at < $3
            ORDER BY eaten_at DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(food_from_row).collect())
    }

    /// Deletes the entry only if it belongs to `user_id`.
    pub async fn delete_food(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM foods WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        password_hash: row.get(2),
        created_at: row.get(3),
        password_updated_at: row.get(4),
    }
}

fn food_from_row(row: &PgRow) -> FoodEntry {
    FoodEntry {
        id: row.get(0),
        user_id: row.get(1),
        name: row.get(2),
        calories: row.get(3),
        protein: row.get(4),
        eaten_at: row.get(5),
    }
}
