use crate::{
    client::{DbTransaction, Result},
    record::UserRecord,
};
use sqlx::{query, query_as, query_scalar};
use tracing::debug;
use warble_common::model::{
    Id,
    user::{User, UserMarker},
};

impl DbTransaction {
    /// Records that `follower` follows `followed`. Returns `false` if the edge
    /// already existed, in which case nothing changes.
    pub async fn follow(
        &mut self,
        follower: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            INSERT INTO followers (follower_id, followed_id)
            VALUES (?1, ?2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follower.get())
        .bind(followed.get())
        .execute(self.conn())
        .await?;

        let added = result.rows_affected() > 0;
        debug!(%follower, %followed, added, "Follow");

        Ok(added)
    }

    /// Removes the edge if present. Returns `false` if there was none.
    pub async fn unfollow(
        &mut self,
        follower: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            DELETE FROM followers
            WHERE follower_id = ?1 AND followed_id = ?2
            ",
        )
        .bind(follower.get())
        .bind(followed.get())
        .execute(self.conn())
        .await?;

        let removed = result.rows_affected() > 0;
        debug!(%follower, %followed, removed, "Unfollow");

        Ok(removed)
    }

    pub async fn is_following(
        &mut self,
        follower: Id<UserMarker>,
        followed: Id<UserMarker>,
    ) -> Result<bool> {
        let found = query_scalar::<_, i64>(
            "
            SELECT EXISTS (
                SELECT 1 FROM followers
                WHERE follower_id = ?1 AND followed_id = ?2
            )
            ",
        )
        .bind(follower.get())
        .bind(followed.get())
        .fetch_one(self.conn())
        .await?;

        Ok(found != 0)
    }

    /// Users that `user` follows, by handle.
    pub async fn fetch_followed(&mut self, user: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                followers JOIN users ON users.user_id = followers.followed_id
            WHERE
                followers.follower_id = ?1
            ORDER BY
                users.handle
            ",
        )
        .bind(user.get())
        .fetch_all(self.conn())
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    /// Users following `user`, by handle.
    pub async fn fetch_followers(&mut self, user: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                followers JOIN users ON users.user_id = followers.follower_id
            WHERE
                followers.followed_id = ?1
            ORDER BY
                users.handle
            ",
        )
        .bind(user.get())
        .fetch_all(self.conn())
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    pub async fn count_followed(&mut self, user: Id<UserMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>(
            "
            SELECT COUNT(*) FROM followers WHERE follower_id = ?1
            ",
        )
        .bind(user.get())
        .fetch_one(self.conn())
        .await?;

        Ok(count.cast_unsigned())
    }

    pub async fn count_followers(&mut self, user: Id<UserMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>(
            "
            SELECT COUNT(*) FROM followers WHERE followed_id = ?1
            ",
        )
        .bind(user.get())
        .fetch_one(self.conn())
        .await?;

        Ok(count.cast_unsigned())
    }
}
