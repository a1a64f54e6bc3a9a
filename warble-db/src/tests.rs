use crate::client::{DbClient, DbError, DbTransaction};
use std::num::NonZeroU32;
use time::{Duration, UtcDateTime, macros::utc_datetime};
use warble_common::{
    model::{
        Id,
        credentials::PasswordDigest,
        post::{CreatePost, PartialPost, Post, PostContent, PostMarker},
        session::SessionToken,
        user::{AboutMe, CreateUser, Email, User, UserHandle},
    },
    util::{Page, PositiveDuration},
};

async fn client() -> DbClient {
    let db = DbClient::connect_in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

async fn file_client(dir: &tempfile::TempDir) -> DbClient {
    let url = format!("sqlite://{}", dir.path().join("warble.db").display());
    let db = DbClient::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    db
}

fn new_user(name: &str) -> CreateUser {
    CreateUser {
        handle: UserHandle::new(name.to_owned()).unwrap(),
        email: Email::new(format!("{name}@example.com")).unwrap(),
        password: None,
    }
}

async fn create_user(tx: &mut DbTransaction, name: &str) -> User {
    tx.create_user(&new_user(name)).await.unwrap()
}

async fn create_post(
    tx: &mut DbTransaction,
    author: &User,
    timestamp: UtcDateTime,
) -> PartialPost {
    let post = CreatePost {
        content: PostContent::new(format!("post from {}", author.handle)).unwrap(),
        timestamp,
    };
    tx.create_post(author.id, &post).await.unwrap()
}

fn first_page() -> Page {
    Page::first(NonZeroU32::new(25).unwrap())
}

fn ids(posts: &[Post]) -> Vec<Id<PostMarker>> {
    posts.iter().map(|post| post.id).collect()
}

fn handles(users: &[User]) -> Vec<&str> {
    users.iter().map(|user| user.handle.get()).collect()
}

#[tokio::test]
async fn create_and_fetch_user() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    assert_eq!(john.handle.get(), "john");
    assert_eq!(john.email.get(), "john@example.com");
    assert_eq!(john.about_me, None);
    assert_eq!(john.last_seen, None);
    assert_eq!(john.password, None);

    assert_eq!(tx.fetch_user(john.id).await.unwrap(), Some(john.clone()));
    assert_eq!(
        tx.fetch_user_by_handle(&john.handle).await.unwrap(),
        Some(john.clone())
    );
    assert_eq!(tx.fetch_user((john.id.get() + 1).into()).await.unwrap(), None);
}

#[tokio::test]
async fn duplicate_handle_or_email_is_unique_violation() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    create_user(&mut tx, "john").await;

    let same_handle = CreateUser {
        email: Email::new("other@example.com".to_owned()).unwrap(),
        ..new_user("john")
    };
    let err = tx.create_user(&same_handle).await.unwrap_err();
    assert!(err.is_unique_violation());

    let same_email = CreateUser {
        handle: UserHandle::new("johnny".to_owned()).unwrap(),
        ..new_user("john")
    };
    let err = tx.create_user(&same_email).await.unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn password_persists_as_digest() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let mut susan = create_user(&mut tx, "susan").await;
    assert!(!susan.check_password("cat"));

    susan.set_password("cat").unwrap();
    let digest = susan.password.clone().unwrap();
    assert!(tx.update_password(susan.id, &digest).await.unwrap());

    let stored = tx.fetch_user(susan.id).await.unwrap().unwrap();
    assert!(stored.check_password("cat"));
    assert!(!stored.check_password("dog"));

    let unknown = PasswordDigest::new("cat").unwrap();
    assert!(!tx.update_password(12_345.into(), &unknown).await.unwrap());
}

#[tokio::test]
async fn profile_updates() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let mary = create_user(&mut tx, "mary").await;

    let about_me = AboutMe::new("I like cats".to_owned()).unwrap();
    let updated = tx
        .update_about_me(mary.id, Some(&about_me))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.about_me, Some(about_me));

    let cleared = tx.update_about_me(mary.id, None).await.unwrap().unwrap();
    assert_eq!(cleared.about_me, None);

    let seen = utc_datetime!(2025-03-04 05:06:07.890);
    tx.record_last_seen(mary.id, seen).await.unwrap();
    assert_eq!(
        tx.fetch_user(mary.id).await.unwrap().unwrap().last_seen,
        Some(seen)
    );

    assert_eq!(tx.update_about_me(999.into(), None).await.unwrap(), None);
}

#[tokio::test]
async fn follow() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    assert!(tx.fetch_followed(john.id).await.unwrap().is_empty());
    assert!(tx.fetch_followers(john.id).await.unwrap().is_empty());
    assert!(!tx.is_following(john.id, susan.id).await.unwrap());

    assert!(tx.follow(john.id, susan.id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    assert!(tx.is_following(john.id, susan.id).await.unwrap());
    assert!(!tx.is_following(susan.id, john.id).await.unwrap());
    assert_eq!(tx.count_followed(john.id).await.unwrap(), 1);
    assert_eq!(handles(&tx.fetch_followed(john.id).await.unwrap()), ["susan"]);
    assert_eq!(tx.count_followers(susan.id).await.unwrap(), 1);
    assert_eq!(handles(&tx.fetch_followers(susan.id).await.unwrap()), ["john"]);

    assert!(tx.unfollow(john.id, susan.id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    assert!(!tx.is_following(john.id, susan.id).await.unwrap());
    assert_eq!(tx.count_followed(john.id).await.unwrap(), 0);
    assert_eq!(tx.count_followers(susan.id).await.unwrap(), 0);
}

#[tokio::test]
async fn follow_and_unfollow_are_idempotent() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;

    assert!(!tx.unfollow(john.id, susan.id).await.unwrap());
    assert_eq!(tx.count_followed(john.id).await.unwrap(), 0);

    assert!(tx.follow(john.id, susan.id).await.unwrap());
    assert!(!tx.follow(john.id, susan.id).await.unwrap());
    assert_eq!(tx.count_followed(john.id).await.unwrap(), 1);
    assert_eq!(tx.count_followers(susan.id).await.unwrap(), 1);

    assert!(tx.unfollow(john.id, susan.id).await.unwrap());
    assert!(!tx.unfollow(john.id, susan.id).await.unwrap());
    assert_eq!(tx.count_followed(john.id).await.unwrap(), 0);
}

#[tokio::test]
async fn following_unknown_user_is_foreign_key_violation() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;

    let err = tx.follow(john.id, 4242.into()).await.unwrap_err();
    assert!(err.is_foreign_key_violation());
}

#[tokio::test]
async fn rollback_discards_follow() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();
    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    tx.follow(john.id, susan.id).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    tx.follow(susan.id, john.id).await.unwrap();
    drop(tx);

    let mut tx = db.begin().await.unwrap();
    assert!(!tx.is_following(john.id, susan.id).await.unwrap());
    assert!(!tx.is_following(susan.id, john.id).await.unwrap());
}

#[tokio::test]
async fn followed_posts() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    let mary = create_user(&mut tx, "mary").await;
    let david = create_user(&mut tx, "david").await;

    let now = UtcDateTime::now();
    let john_post = create_post(&mut tx, &john, now + Duration::seconds(1)).await;
    let susan_post = create_post(&mut tx, &susan, now + Duration::seconds(4)).await;
    let mary_post = create_post(&mut tx, &mary, now + Duration::seconds(3)).await;
    let david_post = create_post(&mut tx, &david, now + Duration::seconds(2)).await;
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    tx.follow(john.id, susan.id).await.unwrap();
    tx.follow(john.id, david.id).await.unwrap();
    tx.follow(susan.id, mary.id).await.unwrap();
    tx.follow(mary.id, david.id).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let john_feed = tx.fetch_followed_posts(john.id, first_page()).await.unwrap();
    let susan_feed = tx.fetch_followed_posts(susan.id, first_page()).await.unwrap();
    let mary_feed = tx.fetch_followed_posts(mary.id, first_page()).await.unwrap();
    let david_feed = tx.fetch_followed_posts(david.id, first_page()).await.unwrap();

    assert_eq!(ids(&john_feed), [susan_post.id, david_post.id, john_post.id]);
    assert_eq!(ids(&susan_feed), [susan_post.id, mary_post.id]);
    assert_eq!(ids(&mary_feed), [mary_post.id, david_post.id]);
    assert_eq!(ids(&david_feed), [david_post.id]);

    assert_eq!(john_feed[0].author, susan);
    assert_eq!(PartialPost::from(john_feed[2].clone()), john_post);
}

#[tokio::test]
async fn followed_posts_ties_break_by_newest_id() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    tx.follow(john.id, susan.id).await.unwrap();

    let at = utc_datetime!(2025-05-05 12:00);
    let first = create_post(&mut tx, &susan, at).await;
    let second = create_post(&mut tx, &john, at).await;
    let third = create_post(&mut tx, &susan, at).await;

    let feed = tx.fetch_followed_posts(john.id, first_page()).await.unwrap();
    assert_eq!(ids(&feed), [third.id, second.id, first.id]);
}

#[tokio::test]
async fn self_follow_does_not_duplicate_posts() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let post = create_post(&mut tx, &john, UtcDateTime::now()).await;

    assert!(tx.follow(john.id, john.id).await.unwrap());
    assert!(tx.is_following(john.id, john.id).await.unwrap());

    let feed = tx.fetch_followed_posts(john.id, first_page()).await.unwrap();
    assert_eq!(ids(&feed), [post.id]);
}

#[tokio::test]
async fn feed_pagination() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let start = utc_datetime!(2025-01-01 00:00);
    let mut posts = Vec::new();
    for minute in 0..5 {
        posts.push(create_post(&mut tx, &john, start + Duration::minutes(minute)).await);
    }
    posts.reverse();

    let size = NonZeroU32::new(2).unwrap();
    let mut seen = Vec::new();
    for number in 1..=3 {
        let page = Page::new(NonZeroU32::new(number).unwrap(), size);
        let feed = tx.fetch_followed_posts(john.id, page).await.unwrap();
        assert_eq!(feed.len(), if number == 3 { 1 } else { 2 });
        seen.extend(ids(&feed));
    }

    let expected: Vec<_> = posts.iter().map(|post| post.id).collect();
    assert_eq!(seen, expected);

    let far = Page::new(NonZeroU32::MAX, NonZeroU32::MAX);
    assert!(tx.fetch_followed_posts(john.id, far).await.unwrap().is_empty());
}

#[tokio::test]
async fn user_posts_and_explore() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    let start = utc_datetime!(2025-01-01 00:00);
    let john_old = create_post(&mut tx, &john, start).await;
    let susan_post = create_post(&mut tx, &susan, start + Duration::seconds(5)).await;
    let john_new = create_post(&mut tx, &john, start + Duration::seconds(10)).await;

    let john_posts = tx
        .fetch_user_posts(john.id, first_page())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(john_posts, [john_new.clone(), john_old.clone()]);

    assert_eq!(
        tx.fetch_user_posts(777.into(), first_page()).await.unwrap(),
        None
    );

    let explore = tx.fetch_recent_posts(first_page()).await.unwrap();
    assert_eq!(ids(&explore), [john_new.id, susan_post.id, john_old.id]);

    let fetched = tx.fetch_post(susan_post.id).await.unwrap().unwrap();
    assert_eq!(fetched.author, susan);
    assert_eq!(fetched.content.get(), "post from susan");
    assert_eq!(fetched.timestamp, start + Duration::seconds(5));
    assert_eq!(tx.fetch_post(9_999.into()).await.unwrap(), None);
}

#[tokio::test]
async fn sessions() {
    let db = client().await;
    let mut tx = db.begin().await.unwrap();

    let john = create_user(&mut tx, "john").await;
    let (_, session) = SessionToken::issue(
        john.id,
        utc_datetime!(2025-02-02 02:02),
        PositiveDuration::from_seconds(3600),
    )
    .unwrap();
    tx.create_session(&session).await.unwrap();

    let fetched = tx.fetch_session(&session.token_hash).await.unwrap();
    assert_eq!(fetched, Some(session.clone()));

    let other = SessionToken::generate(john.id).hash().unwrap();
    assert_eq!(tx.fetch_session(&other).await.unwrap(), None);

    assert!(tx.delete_session(&session.token_hash).await.unwrap());
    assert!(!tx.delete_session(&session.token_hash).await.unwrap());
    assert_eq!(tx.fetch_session(&session.token_hash).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_writers_wait_for_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_client(&dir).await;

    let mut tx = db.begin_write().await.unwrap();
    let john = create_user(&mut tx, "john").await;
    let susan = create_user(&mut tx, "susan").await;
    let mary = create_user(&mut tx, "mary").await;
    tx.commit().await.unwrap();

    let mut first = db.begin_write().await.unwrap();
    assert!(first.fetch_user(john.id).await.unwrap().is_some());

    let second = tokio::spawn({
        let db = db.clone();
        let (susan, mary) = (susan.id, mary.id);
        async move {
            let mut tx = db.begin_write().await?;
            tx.fetch_user(susan).await?;
            let added = tx.follow(susan, mary).await?;
            tx.commit().await?;
            Ok::<_, DbError>(added)
        }
    });

    assert!(first.follow(john.id, susan.id).await.unwrap());
    first.commit().await.unwrap();

    assert!(second.await.unwrap().unwrap());

    let mut tx = db.begin().await.unwrap();
    assert!(tx.is_following(john.id, susan.id).await.unwrap());
    assert!(tx.is_following(susan.id, mary.id).await.unwrap());
}
