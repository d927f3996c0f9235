//! # Branch and User Repositories
//!
//! Reference data the checkout resolves before it writes anything.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tillpoint_core::validation::{validate_id, validate_name};
use tillpoint_core::{Branch, CoreError, User};

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// Inserts a branch.
    pub async fn insert(&self, id: &str, name: &str) -> DbResult<Branch> {
        validate_id("branchId", id).map_err(CoreError::from)?;
        validate_name("name", name).map_err(CoreError::from)?;

        debug!(id = %id, name = %name, "Inserting branch");

        let branch = Branch {
            id: id.to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO branches (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&branch.id)
            .bind(&branch.name)
            .bind(branch.created_at)
            .execute(&self.pool)
            .await?;

        Ok(branch)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            "SELECT id, name, created_at FROM branches ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Branch>, sqlx::Error> {
        sqlx::query_as::<_, Branch>("SELECT id, name, created_at FROM branches WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Fails with NotFound unless the branch exists.
    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Branch> {
        let branch = Self::find_tx(conn, id).await?;
        Ok(branch.ok_or_else(|| CoreError::not_found("branch", id))?)
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a cashier or back-office user.
    pub async fn insert(&self, id: &str, name: &str, branch_id: Option<&str>) -> DbResult<User> {
        validate_id("userId", id).map_err(CoreError::from)?;
        validate_name("name", name).map_err(CoreError::from)?;

        let user = User {
            id: id.to_string(),
            name: name.trim().to_string(),
            branch_id: branch_id.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO users (id, name, branch_id, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.branch_id)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, name, branch_id, created_at FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<User> {
        let user = Self::find_tx(conn, id).await?;
        Ok(user.ok_or_else(|| CoreError::not_found("cashier", id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::DbError;
    use tillpoint_core::ErrorKind;

    #[tokio::test]
    async fn test_branch_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.branches().insert("branch-1", " Downtown ").await.unwrap();

        let branch = db.branches().get_by_id("branch-1").await.unwrap().unwrap();
        assert_eq!(branch.name, "Downtown");
        assert!(db.branches().get_by_id("nope").await.unwrap().is_none());
        assert_eq!(db.branches().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_branch_is_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.branches().insert("branch-1", "Downtown").await.unwrap();

        let err = db.branches().insert("branch-1", "Again").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_user_requires_existing_branch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .users()
            .insert("cashier-1", "Ana", Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
