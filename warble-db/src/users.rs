use crate::{
    client::{DbTransaction, Result},
    record::UserRecord,
};
use sqlx::query_as;
use time::UtcDateTime;
use tracing::debug;
use warble_common::{
    model::{
        Id,
        credentials::PasswordDigest,
        user::{AboutMe, CreateUser, User, UserHandle, UserMarker},
    },
    util::to_unix_millis,
};

impl DbTransaction {
    pub async fn fetch_user(&mut self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                users
            WHERE
                users.user_id = ?1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(self.conn())
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_handle(&mut self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.email,
                users.password_hash,
                users.about_me,
                users.last_seen_ms
            FROM
                users
            WHERE
                users.handle = ?1
            ",
        )
        .bind(handle.get())
        .fetch_optional(self.conn())
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Fails with a unique violation if the handle or email is taken.
    pub async fn create_user(&mut self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users (handle, email, password_hash)
            VALUES (?1, ?2, ?3)
            RETURNING
                user_id,
                handle,
                email,
                password_hash,
                about_me,
                last_seen_ms
            ",
        )
        .bind(user.handle.get())
        .bind(user.email.get())
        .bind(user.password.as_ref().map(PasswordDigest::as_phc_str))
        .fetch_one(self.conn())
        .await?;

        let user = User::try_from(record)?;
        debug!(user_id = %user.id, handle = %user.handle, "Created user");

        Ok(user)
    }

    /// Returns whether the user exists.
    pub async fn update_password(
        &mut self,
        user_id: Id<UserMarker>,
        password: &PasswordDigest,
    ) -> Result<bool> {
        let result = sqlx::query(
            "
            UPDATE users
            SET password_hash = ?2
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.get())
        .bind(password.as_phc_str())
        .execute(self.conn())
        .await?;

        debug!(%user_id, "Updated password");
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_about_me(
        &mut self,
        user_id: Id<UserMarker>,
        about_me: Option<&AboutMe>,
    ) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            UPDATE users
            SET about_me = ?2
            WHERE user_id = ?1
            RETURNING
                user_id,
                handle,
                email,
                password_hash,
                about_me,
                last_seen_ms
            ",
        )
        .bind(user_id.get())
        .bind(about_me.map(AboutMe::get))
        .fetch_optional(self.conn())
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn record_last_seen(
        &mut self,
        user_id: Id<UserMarker>,
        time: UtcDateTime,
    ) -> Result<()> {
        sqlx::query(
            "
            UPDATE users
            SET last_seen_ms = ?2
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.get())
        .bind(to_unix_millis(time))
        .execute(self.conn())
        .await?;

        Ok(())
    }
}
