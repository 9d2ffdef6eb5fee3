//! Suggestion workflow end to end: validation before any write, the
//! approval transition into public listings, rejection, and vote
//! uniqueness.

mod common;

use common::{draft, external_station, StaticSource};
use dial_core::session::Session;
use dial_core::Error;
use dial_daemon::db;
use dial_daemon::directory::Directory;
use dial_daemon::notify::Notifier;
use dial_daemon::suggest::SuggestionStore;

async fn workflow() -> (SuggestionStore, Directory) {
    let pool = db::open_in_memory().await.unwrap();
    let store = SuggestionStore::new(pool, Notifier::disabled());
    let directory = Directory::new(
        Box::new(StaticSource {
            stations: vec![external_station("Antenne")],
        }),
        store.clone(),
    );
    (store, directory)
}

#[tokio::test]
async fn invalid_submission_writes_nothing() {
    let (store, _directory) = workflow().await;
    let admin = Session::admin("root");

    let mut missing_email = draft();
    missing_email.contact_email.clear();

    let err = store
        .submit(&Session::Anonymous, missing_email)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // Rejected before any row was written.
    assert!(store.pending(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn approval_publishes_into_directory_listings() {
    let (store, directory) = workflow().await;
    let admin = Session::admin("root");

    let saved = store.submit(&Session::Anonymous, draft()).await.unwrap();

    // Pending rows are not public.
    assert!(directory
        .by_country("DR Congo")
        .await
        .unwrap()
        .iter()
        .all(|s| s.name != "Radio Okapi"));

    store.approve(&admin, &saved.id).await.unwrap();

    let by_country = directory.by_country("DR Congo").await.unwrap();
    assert!(by_country.iter().any(|s| s.id == saved.id));

    let by_tag = directory.by_tag("news").await.unwrap();
    assert!(by_tag.iter().any(|s| s.id == saved.id));

    let by_search = directory.search("Okapi").await.unwrap();
    assert!(by_search.iter().any(|s| s.id == saved.id));

    // External results stay in front of the merged listing.
    let merged = directory.by_country("Germany").await.unwrap();
    assert_eq!(merged[0].name, "Antenne");

    // And the row resolves by its id through the public lookup.
    let found = directory.station_by_id(&saved.id).await.unwrap().unwrap();
    assert_eq!(found.name, "Radio Okapi");
}

#[tokio::test]
async fn rejection_never_reaches_public_listings() {
    let (store, directory) = workflow().await;
    let admin = Session::admin("root");

    let saved = store.submit(&Session::Anonymous, draft()).await.unwrap();
    store.reject(&admin, &saved.id).await.unwrap();

    assert!(directory
        .by_country("DR Congo")
        .await
        .unwrap()
        .iter()
        .all(|s| s.id != saved.id));
    assert!(directory
        .by_tag("news")
        .await
        .unwrap()
        .iter()
        .all(|s| s.id != saved.id));
    assert!(directory.station_by_id(&saved.id).await.unwrap().is_none());
    assert!(store.pending(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn approval_is_admin_only_with_no_partial_effect() {
    let (store, directory) = workflow().await;

    let saved = store.submit(&Session::Anonymous, draft()).await.unwrap();

    let err = store
        .approve(&Session::user("u1"), &saved.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    // Still pending, still invisible.
    let pending = store.pending(&Session::admin("root")).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(directory
        .by_country("DR Congo")
        .await
        .unwrap()
        .iter()
        .all(|s| s.id != saved.id));
}

#[tokio::test]
async fn duplicate_vote_rejects_and_keeps_the_first() {
    let (store, _directory) = workflow().await;
    let voter = Session::user("u1");

    let saved = store.submit(&Session::Anonymous, draft()).await.unwrap();

    store.vote(&voter, &saved.id).await.unwrap();
    let err = store.vote(&voter, &saved.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyVoted));

    assert_eq!(store.by_id(&saved.id).await.unwrap().unwrap().votes, 1);

    // A different user still gets their vote.
    store.vote(&Session::user("u2"), &saved.id).await.unwrap();
    assert_eq!(store.by_id(&saved.id).await.unwrap().unwrap().votes, 2);
}

#[tokio::test]
async fn anonymous_voting_is_rejected() {
    let (store, _directory) = workflow().await;
    let saved = store.submit(&Session::Anonymous, draft()).await.unwrap();

    let err = store.vote(&Session::Anonymous, &saved.id).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(store.by_id(&saved.id).await.unwrap().unwrap().votes, 0);
}
