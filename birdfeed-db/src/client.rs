use crate::record::PostRecord;
use birdfeed_common::{
    model::{
        Id, InvalidIdError, ModelValidationError,
        post::{Post, PostMarker},
        user::{FollowEdge, UserMarker},
    },
    store::PostStore,
};
use sqlx::{
    PgPool,
    migrate::MigrateError,
    postgres::{PgConnectOptions, PgPoolOptions},
    query, query_as, query_scalar,
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<InvalidIdError> for DbError {
    fn from(value: InvalidIdError) -> Self {
        DbError::Data(value.into())
    }
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every statement run through the pool is cancelled by the server after
    /// `statement_timeout`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)?
            .options([("statement_timeout", statement_timeout_setting(statement_timeout))]);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        info!(max_connections, ?statement_timeout, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;

        debug!("Database migrations are up to date");
        Ok(())
    }
}

/// Postgres reads a bare number as milliseconds; zero would disable the limit.
fn statement_timeout_setting(timeout: Duration) -> String {
    timeout.as_millis().max(1).to_string()
}

fn into_user_ids(ids: Vec<String>) -> Result<Vec<Id<UserMarker>>> {
    ids.into_iter()
        .map(|id| Id::new(id).map_err(DbError::from))
        .collect()
}

fn into_posts(records: Vec<PostRecord>) -> Result<Vec<Post>> {
    records
        .into_iter()
        .map(|record| Post::try_from(record).map_err(DbError::from))
        .collect()
}

impl PostStore for DbClient {
    type Error = DbError;

    async fn create_post(&self, post: &Post) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, author_id, text, created_at
            ",
        )
        .bind(post.id.get())
        .bind(post.author_id.get())
        .bind(post.text.get())
        .bind(post.created_at)
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn find_post_by_id(&self, id: &Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.author_id,
                posts.text,
                posts.created_at
            FROM
                posts.posts
            WHERE
                posts.id = $1
            ",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn list_follower_ids(&self, user_id: &Id<UserMarker>) -> Result<Vec<Id<UserMarker>>> {
        let ids = query_scalar::<_, String>(
            "
            SELECT
                follows.follower_id
            FROM
                follows.follows
            WHERE
                follows.followed_id = $1
            ORDER BY
                follows.created_at, follows.follower_id
            ",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        into_user_ids(ids)
    }

    async fn list_followed_ids(&self, user_id: &Id<UserMarker>) -> Result<Vec<Id<UserMarker>>> {
        let ids = query_scalar::<_, String>(
            "
            SELECT
                follows.followed_id
            FROM
                follows.follows
            WHERE
                follows.follower_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        into_user_ids(ids)
    }

    async fn list_latest_post_per_account(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> Result<Vec<Post>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<String> = user_ids.iter().map(|id| id.get().to_owned()).collect();
        let records = query_as::<_, PostRecord>(
            "
            SELECT DISTINCT ON (posts.author_id)
                posts.id,
                posts.author_id,
                posts.text,
                posts.created_at
            FROM
                posts.posts
            WHERE
                posts.author_id = ANY($1)
            ORDER BY
                posts.author_id, posts.created_at DESC, posts.id DESC
            ",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        into_posts(records)
    }

    async fn list_posts_by_ids(&self, ids: &[Id<PostMarker>]) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.iter().map(|id| id.get().to_owned()).collect();
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.author_id,
                posts.text,
                posts.created_at
            FROM
                posts.posts
            WHERE
                posts.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        into_posts(records)
    }

    async fn create_follow_edge(&self, edge: &FollowEdge) -> Result<()> {
        let result = query(
            "
            INSERT INTO follows.follows (follower_id, followed_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            ",
        )
        .bind(edge.follower_id.get())
        .bind(edge.followed_id.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                follower_id = %edge.follower_id,
                followed_id = %edge.followed_id,
                "Follow edge already existed"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::client::statement_timeout_setting;
    use std::time::Duration;

    #[test]
    fn statement_timeout_is_in_milliseconds() {
        assert_eq!(statement_timeout_setting(Duration::from_secs(5)), "5000");
        assert_eq!(statement_timeout_setting(Duration::from_micros(10)), "1");
    }
}
