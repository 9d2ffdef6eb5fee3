//! End-to-end favorites flow: anonymous local list, login migration,
//! idempotent writes, changed notifications.

use dial_core::session::Session;
use dial_daemon::bus::{self, BusEvent};
use dial_daemon::db;
use dial_daemon::favorites::FavoritesStore;

async fn store_with_bus(dir: &tempfile::TempDir) -> (FavoritesStore, bus::Bus) {
    let pool = db::open_in_memory().await.unwrap();
    let bus = bus::channel();
    let store = FavoritesStore::new(pool, dir.path().join("favorites.json"), bus.clone());
    (store, bus)
}

#[tokio::test]
async fn anonymous_favorites_live_in_the_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _bus) = store_with_bus(&dir).await;
    let anon = Session::Anonymous;

    store.add(&anon, "x").await.unwrap();
    store.add(&anon, "y").await.unwrap();

    assert_eq!(store.favorites(&anon).await.unwrap(), vec!["x", "y"]);
    assert!(dir.path().join("favorites.json").exists());
}

#[tokio::test]
async fn login_migrates_local_entries_and_empties_the_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _bus) = store_with_bus(&dir).await;

    // Anonymous user favorites station "X" (stored locally).
    store.add(&Session::Anonymous, "X").await.unwrap();
    store.add(&Session::Anonymous, "Y").await.unwrap();

    // After login, the first read returns "X" from the remote rows.
    let user = Session::user("u1");
    let favorites = store.favorites(&user).await.unwrap();
    assert!(favorites.contains(&"X".to_string()));
    assert!(favorites.contains(&"Y".to_string()));

    // The local store is empty afterwards, for the anonymous scope too.
    assert!(!dir.path().join("favorites.json").exists());
    assert!(store.favorites(&Session::Anonymous).await.unwrap().is_empty());

    // And the remote copy survives subsequent reads (no re-migration).
    let again = store.favorites(&user).await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn migration_merges_with_existing_remote_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _bus) = store_with_bus(&dir).await;
    let user = Session::user("u1");

    store.add(&user, "X").await.unwrap();
    store.add(&Session::Anonymous, "X").await.unwrap();
    store.add(&Session::Anonymous, "Z").await.unwrap();

    // The duplicate "X" collapses on the unique index.
    let favorites = store.favorites(&user).await.unwrap();
    assert_eq!(favorites.len(), 2);
    assert!(favorites.contains(&"X".to_string()));
    assert!(favorites.contains(&"Z".to_string()));
}

#[tokio::test]
async fn add_favorite_is_idempotent_for_users() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _bus) = store_with_bus(&dir).await;
    let user = Session::user("u1");

    store.add(&user, "X").await.unwrap();
    store.add(&user, "X").await.unwrap();

    assert_eq!(store.favorites(&user).await.unwrap(), vec!["X"]);

    store.remove(&user, "X").await.unwrap();
    store.remove(&user, "X").await.unwrap();
    assert!(store.favorites(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn is_favorite_rereads_the_current_set() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _bus) = store_with_bus(&dir).await;
    let user = Session::user("u1");

    assert!(!store.is_favorite(&user, "X").await.unwrap());
    store.add(&user, "X").await.unwrap();
    assert!(store.is_favorite(&user, "X").await.unwrap());
    store.remove(&user, "X").await.unwrap();
    assert!(!store.is_favorite(&user, "X").await.unwrap());
}

#[tokio::test]
async fn migration_announces_a_favorites_change() {
    let dir = tempfile::tempdir().unwrap();
    let (store, bus) = store_with_bus(&dir).await;

    store.add(&Session::Anonymous, "X").await.unwrap();

    let mut rx = bus.subscribe();
    store.favorites(&Session::user("u1")).await.unwrap();

    assert!(matches!(
        rx.try_recv().unwrap(),
        BusEvent::FavoritesChanged
    ));
}
