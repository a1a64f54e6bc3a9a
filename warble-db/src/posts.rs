use crate::{
    client::{DbTransaction, Result},
    record::{FullPostRecord, PartialPostRecord},
};
use sqlx::query_as;
use tracing::debug;
use warble_common::{
    model::{
        Id,
        post::{CreatePost, PartialPost, Post, PostMarker},
        user::UserMarker,
    },
    util::{Page, to_unix_millis},
};

impl DbTransaction {
    pub async fn create_post(
        &mut self,
        author: Id<UserMarker>,
        post: &CreatePost,
    ) -> Result<PartialPost> {
        let record = query_as::<_, PartialPostRecord>(
            "
            INSERT INTO posts (user_id, content, created_at_ms)
            VALUES (?1, ?2, ?3)
            RETURNING
                post_id,
                user_id,
                content,
                created_at_ms
            ",
        )
        .bind(author.get())
        .bind(post.content.get())
        .bind(to_unix_millis(post.timestamp))
        .fetch_one(self.conn())
        .await?;

        let post = PartialPost::try_from(record)?;
        debug!(post_id = %post.id, %author, "Created post");

        Ok(post)
    }

    pub async fn fetch_post(&mut self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.content,
                posts.created_at_ms,
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                posts JOIN users ON users.user_id = posts.user_id
            WHERE
                posts.post_id = ?1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(self.conn())
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    /// The user's own posts, newest first. `None` if the user does not exist.
    pub async fn fetch_user_posts(
        &mut self,
        user: Id<UserMarker>,
        page: Page,
    ) -> Result<Option<Vec<PartialPost>>> {
        if self.fetch_user(user).await?.is_none() {
            return Ok(None);
        }

        let records = query_as::<_, PartialPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.user_id,
                posts.content,
                posts.created_at_ms
            FROM
                posts
            WHERE
                posts.user_id = ?1
            ORDER BY
                posts.created_at_ms DESC,
                posts.post_id DESC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(user.get())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.conn())
        .await?;

        let posts = records
            .into_iter()
            .map(PartialPost::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(posts))
    }

    /// The feed of `user`: their own posts plus the posts of everyone they
    /// follow, newest first. Posts with equal timestamps are ordered by
    /// descending id, i.e. the later insert comes first.
    pub async fn fetch_followed_posts(
        &mut self,
        user: Id<UserMarker>,
        page: Page,
    ) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.content,
                posts.created_at_ms,
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                posts JOIN users ON users.user_id = posts.user_id
            WHERE
                posts.user_id = ?1
                OR posts.user_id IN (
                    SELECT followers.followed_id
                    FROM followers
                    WHERE followers.follower_id = ?1
                )
            ORDER BY
                posts.created_at_ms DESC,
                posts.post_id DESC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(user.get())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.conn())
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    /// Every post, newest first.
    pub async fn fetch_recent_posts(&mut self, page: Page) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.content,
                posts.created_at_ms,
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                posts JOIN users ON users.user_id = posts.user_id
            ORDER BY
                posts.created_at_ms DESC,
                posts.post_id DESC
            LIMIT ?1 OFFSET ?2
            ",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.conn())
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }
}
