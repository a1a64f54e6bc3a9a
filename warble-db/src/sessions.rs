use crate::{
    client::{DbTransaction, Result},
    record::SessionRecord,
};
use sqlx::{query, query_as};
use tracing::debug;
use warble_common::{
    model::session::{Session, SessionTokenHash},
    util::to_unix_millis,
};

impl DbTransaction {
    pub async fn create_session(&mut self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO sessions (token_hash, user_id, created_at_ms, expires_after_seconds)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(session.token_hash.as_bytes())
        .bind(session.user.get())
        .bind(to_unix_millis(session.created_at))
        .bind(
            session
                .expires_after
                .map(|duration| duration.get().whole_seconds()),
        )
        .execute(self.conn())
        .await?;

        debug!(user_id = %session.user, "Created session");
        Ok(())
    }

    pub async fn fetch_session(&mut self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, SessionRecord>(
            "
            SELECT
                sessions.user_id,
                sessions.token_hash,
                sessions.created_at_ms,
                sessions.expires_after_seconds
            FROM
                sessions
            WHERE
                sessions.token_hash = ?1
            ",
        )
        .bind(token_hash.as_bytes())
        .fetch_optional(self.conn())
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    /// Returns whether a session was removed.
    pub async fn delete_session(&mut self, token_hash: &SessionTokenHash) -> Result<bool> {
        let result = query(
            "
            DELETE FROM sessions
            WHERE token_hash = ?1
            ",
        )
        .bind(token_hash.as_bytes())
        .execute(self.conn())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
