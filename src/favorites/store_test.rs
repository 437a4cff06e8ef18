use super::*;
use crate::storage::MemoryStorage;

fn pid(raw: u64) -> ProductId {
    ProductId::new(raw).unwrap()
}

fn store_on(backend: &MemoryStorage) -> FavoritesStore {
    FavoritesStore::new(Arc::new(backend.context()))
}

#[test]
fn load_absent_is_empty() {
    let backend = MemoryStorage::new();
    assert!(store_on(&backend).load().is_empty());
}

#[test]
fn save_then_load_round_trips_as_json_array() {
    let backend = MemoryStorage::new();
    let store = store_on(&backend);

    assert!(store.save(&[pid(4), pid(9)]));
    assert_eq!(backend.peek(DEFAULT_STORAGE_KEY).as_deref(), Some("[4,9]"));
    assert_eq!(store.load(), vec![pid(4), pid(9)]);
}

#[test]
fn corrupt_values_load_as_empty() {
    let backend = MemoryStorage::new();
    let ctx = backend.context();
    let store = FavoritesStore::new(Arc::new(ctx.clone()));

    for raw in ["not json", "{\"a\":1}", "[1, \"two\"]", "[0]", "[-4]"] {
        ctx.set_item(DEFAULT_STORAGE_KEY, raw).unwrap();
        assert!(store.load().is_empty(), "{raw} should load as empty");
    }
}

#[test]
fn disabled_storage_fails_soft_both_ways() {
    let backend = MemoryStorage::new();
    let store = store_on(&backend);
    backend.set_disabled(true);

    assert!(!store.save(&[pid(1)]));
    assert!(store.load().is_empty());
}

#[test]
fn quota_failure_reports_false() {
    let backend = MemoryStorage::with_quota(12);
    let store = store_on(&backend);

    assert!(store.save(&[pid(1)]));
    assert!(!store.save(&[pid(1), pid(2), pid(3)]));
    assert_eq!(store.load(), vec![pid(1)]);
}

#[test]
fn custom_key_is_respected() {
    let backend = MemoryStorage::new();
    let store = FavoritesStore::with_key(Arc::new(backend.context()), "shop:favs");
    store.save(&[pid(2)]);
    assert_eq!(store.key(), "shop:favs");
    assert_eq!(backend.peek("shop:favs").as_deref(), Some("[2]"));
    assert_eq!(backend.peek(DEFAULT_STORAGE_KEY), None);
}

#[test]
fn load_checked_separates_absent_from_unreadable() {
    let backend = MemoryStorage::new();
    let ctx = backend.context();
    let store = FavoritesStore::new(Arc::new(ctx.clone()));

    assert_eq!(store.load_checked(), Some(Vec::new()));
    ctx.set_item(DEFAULT_STORAGE_KEY, "garbage").unwrap();
    assert_eq!(store.load_checked(), None);
    backend.set_disabled(true);
    assert_eq!(store.load_checked(), None);
}
