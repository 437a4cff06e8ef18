use super::*;

use std::sync::{Arc, Mutex};

use crate::storage::MemoryStorage;
use crate::sync::test_helpers::{Mode, StubApi, pid, service_on, user};

#[test]
fn new_seeds_from_core() {
    let manager = FavoritesManager::new(Arc::new(MemoryStorage::new().context()));
    manager.add_favorite(pid(1));

    assert!(ToggleControlState::new(pid(1), &manager).is_favorite);
    assert!(!ToggleControlState::new(pid(2), &manager).is_favorite);
}

#[test]
fn begin_disables_until_finish() {
    let manager = FavoritesManager::new(Arc::new(MemoryStorage::new().context()));
    let mut control = ToggleControlState::new(pid(1), &manager);

    assert!(control.begin());
    assert!(control.disabled());
    assert!(!control.begin());

    control.finish(&SyncOutcome { success: true, is_favorite: true, error: None });
    assert!(!control.disabled());
    assert!(control.is_favorite);
    assert_eq!(control.notice, Some(Notice::Info("added to favorites".into())));
}

#[test]
fn outcomes_map_to_notices() {
    let manager = FavoritesManager::new(Arc::new(MemoryStorage::new().context()));
    let mut control = ToggleControlState::new(pid(1), &manager);

    control.begin();
    control.finish(&SyncOutcome { success: true, is_favorite: true, error: Some("offline".into()) });
    assert!(matches!(&control.notice, Some(Notice::Warning(msg)) if msg.contains("offline")));
    assert!(control.is_favorite);

    control.begin();
    control.finish(&SyncOutcome { success: false, is_favorite: true, error: Some("no id".into()) });
    assert_eq!(control.notice, Some(Notice::Error("no id".into())));

    control.begin();
    control.finish(&SyncOutcome { success: true, is_favorite: false, error: None });
    assert_eq!(control.notice, Some(Notice::Info("removed from favorites".into())));
    assert!(!control.is_favorite);

    control.dismiss_notice();
    assert_eq!(control.notice, None);
}

#[test]
fn mirrors_changes_made_elsewhere() {
    let manager = FavoritesManager::new(Arc::new(MemoryStorage::new().context()));
    let control = Arc::new(Mutex::new(ToggleControlState::new(pid(4), &manager)));

    let mirror = Arc::clone(&control);
    let _sub = manager.add_listener(move |event| mirror.lock().unwrap().apply_change(event));

    // Another card for the same product toggles it.
    manager.toggle_favorite(pid(4));
    assert!(control.lock().unwrap().is_favorite);
    manager.toggle_favorite(pid(4));
    assert!(!control.lock().unwrap().is_favorite);
}

#[tokio::test]
async fn click_cycle_against_failing_service() {
    let backend = MemoryStorage::new();
    let api = StubApi::new(Mode::Fail);
    let service = service_on(&backend, &api);
    let mut control = ToggleControlState::new(pid(7), service.manager());

    assert!(control.begin());
    let outcome = service.toggle_favorite(pid(7), Some(&user("user1"))).await;
    control.finish(&outcome);

    assert!(control.is_favorite);
    assert!(matches!(control.notice, Some(Notice::Warning(_))));
    assert!(service.manager().is_favorite(pid(7)));
}
