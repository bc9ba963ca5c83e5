use crate::record::{
    AuthenticationRecord, CommentRecord, FullPostRecord, GroupRecord, UserRecord,
};
use pinnwand_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, AuthTokenHash},
    comment::{Comment, CommentMarker, CreateComment},
    follow::Follow,
    group::{CreateGroup, Group, GroupMarker},
    post::{CreatePost, EditPost, Post, PostMarker},
    user::{CreateUser, User, UserHandle, UserMarker},
};
use pinnwand_common::pagination::{Page, Paginator};
use pinnwand_common::util::PositiveDuration;
use sqlx::{
    SqlitePool,
    migrate::MigrateError,
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{num::NonZeroU32, str::FromStr};
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::info;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
}

/// Which posts a listing shows.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

impl PostFilter {
    fn condition(self) -> (&'static str, Option<i64>) {
        match self {
            PostFilter::All => ("TRUE", None),
            PostFilter::Group(group) => ("posts.group_id = ?", Some(group.get())),
            PostFilter::Author(author) => ("posts.author_id = ?", Some(author.get())),
            PostFilter::FollowedBy(user) => (
                "posts.author_id IN (SELECT follows.author_id FROM follows WHERE follows.user_id = ?)",
                Some(user.get()),
            ),
        }
    }
}

const FULL_POST_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.pub_date,
        posts.image,
        users.user_id AS author_id,
        users.handle AS author_handle,
        post_groups.group_id,
        post_groups.title AS group_title,
        post_groups.slug AS group_slug,
        post_groups.description AS group_description
    FROM
        posts
        JOIN users ON users.user_id = posts.author_id
        LEFT JOIN post_groups ON post_groups.group_id = posts.group_id
";

fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

const NEWEST_FIRST: &str = "ORDER BY posts.pub_date DESC, posts.post_id DESC";

#[derive(Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url` and brings its schema up to
    /// date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let client = Self::new(pool);
        client.migrate().await?;
        Ok(client)
    }

    /// A private, migrated in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since every SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let client = Self::new(pool);
        client.migrate().await?;
        Ok(client)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users
            WHERE
                users.user_id = ?
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users
            WHERE
                users.handle = ?
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = query_scalar::<_, i64>(
            "
            INSERT INTO users (handle)
            VALUES (?)
            RETURNING user_id
            ",
        )
        .bind(user.handle.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: user_id.into(),
            handle: user.handle.clone(),
        })
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth_tokens.user_id,
                auth_tokens.token_hash,
                auth_tokens.created_at,
                auth_tokens.expires_after_seconds
            FROM
                auth_tokens
            WHERE
                auth_tokens.token_hash = ?
            ",
        )
        .bind(token_hash.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn create_auth(
        &self,
        user: Id<UserMarker>,
        token_hash: &AuthTokenHash,
        expires_after: Option<PositiveDuration>,
    ) -> Result<()> {
        query(
            "
            INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_after_seconds)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(token_hash.as_bytes())
        .bind(user.get())
        .bind(utc_now())
        .bind(expires_after.map(|duration| duration.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            WHERE
                post_groups.slug = ?
            ",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Group::from))
    }

    /// All groups, ordered by title, e.g. as choices for a post form.
    pub async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            ORDER BY
                post_groups.title, post_groups.group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Group::from).collect())
    }

    pub async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id = query_scalar::<_, i64>(
            "
            INSERT INTO post_groups (title, slug, description)
            VALUES (?, ?, ?)
            RETURNING group_id
            ",
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(Group {
            id: group_id.into(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("{FULL_POST_SELECT} WHERE posts.post_id = ?");
        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.get())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    /// One page of the posts matching `filter`, newest first.
    ///
    /// `requested_page` is the raw page query value; see [`Paginator::window`].
    pub async fn fetch_post_page(
        &self,
        filter: PostFilter,
        requested_page: Option<&str>,
        per_page: NonZeroU32,
    ) -> Result<Page<Post>> {
        let (condition, param) = filter.condition();

        let count_sql = format!("SELECT COUNT(*) FROM posts WHERE {condition}");
        let mut count_query = query_scalar::<_, i64>(&count_sql);
        if let Some(param) = param {
            count_query = count_query.bind(param);
        }
        let count = count_query.fetch_one(&self.pool).await?;

        let window = Paginator::new(count.cast_unsigned(), per_page).window(requested_page);

        let page_sql =
            format!("{FULL_POST_SELECT} WHERE {condition} {NEWEST_FIRST} LIMIT ? OFFSET ?");
        let mut page_query = query_as::<_, FullPostRecord>(&page_sql);
        if let Some(param) = param {
            page_query = page_query.bind(param);
        }
        let records = page_query
            .bind(window.limit().cast_signed())
            .bind(window.offset().cast_signed())
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(window.into_page(posts))
    }

    pub async fn count_posts(&self) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let post_id = query_scalar::<_, i64>(
            "
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?, ?, ?, ?, ?)
            RETURNING post_id
            ",
        )
        .bind(&post.text)
        .bind(utc_now())
        .bind(post.author.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(post_id.into())
    }

    /// Returns whether the post existed.
    pub async fn edit_post(&self, post_id: Id<PostMarker>, edit: &EditPost) -> Result<bool> {
        let result = query(
            "
            UPDATE posts
            SET
                text = ?,
                group_id = ?,
                image = COALESCE(?, image)
            WHERE
                post_id = ?
            ",
        )
        .bind(&edit.text)
        .bind(edit.group.map(Id::get))
        .bind(edit.image.as_deref())
        .bind(post_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Comments on a post, oldest first.
    pub async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created,
                users.user_id AS author_id,
                users.handle AS author_handle
            FROM
                comments
                JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.post_id = ?
            ORDER BY
                comments.created, comments.comment_id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub async fn count_comments(&self) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let comment_id = query_scalar::<_, i64>(
            "
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES (?, ?, ?, ?)
            RETURNING comment_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(&comment.text)
        .bind(utc_now())
        .fetch_one(&self.pool)
        .await?;

        Ok(comment_id.into())
    }

    pub async fn is_following(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let following = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM follows WHERE follows.user_id = ? AND follows.author_id = ?
            )
            ",
        )
        .bind(user.get())
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }

    /// Returns whether a new edge was stored; following twice is a no-op.
    pub async fn create_follow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            INSERT INTO follows (user_id, author_id)
            VALUES (?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follow.user().get())
        .bind(follow.author().get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns whether there was an edge to delete.
    pub async fn delete_follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count_follows(&self) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM follows")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }
}
