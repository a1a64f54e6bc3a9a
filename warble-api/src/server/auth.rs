use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::trace;
use warble_common::model::{
    Id,
    session::{SessionToken, SessionTokenHash},
    user::UserMarker,
};
use warble_db::client::DbClient;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller, identified by a live bearer session token.
///
/// Extracting it also stamps the user's `last_seen`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: SessionTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &SessionTokenHash {
        &self.token_hash
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: SessionToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let token_hash = request_token.hash()?;
        let now = UtcDateTime::now();

        let mut tx = Arc::<DbClient>::from_ref(state).begin_write().await?;

        let session = tx
            .fetch_session(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if !session.admits(&request_token, now) {
            return Err(ServerError::InvalidToken);
        }

        tx.record_last_seen(session.user, now).await?;
        tx.commit().await?;

        trace!(user_id = %session.user, "Authenticated request");

        Ok(Self {
            id: session.user,
            token_hash,
        })
    }
}
