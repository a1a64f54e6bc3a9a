use crate::server::ServerRouter;

mod posts;
mod sessions;
mod users;

#[cfg(test)]
pub(super) use users::PROFILE_AVATAR_SIZE;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(sessions::routes())
        .merge(users::routes())
}
