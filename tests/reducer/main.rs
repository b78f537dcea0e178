//! Integration tests for the entity reducer, selectors and store.

mod themes;

use std::sync::{Arc, Mutex};

use entity_query_cache::selectors::{
    get_collection_items, get_item_by_global_id, get_items_for_query,
    get_items_for_query_ignoring_page, get_last_page_for_query, is_last_page_for_query,
    is_requesting_items_for_query, is_requesting_items_for_query_ignoring_page,
};
use entity_query_cache::{
    reduce, AttributeMatcher, CollectionKey, EntityAction, EntityState, ItemId, Query,
    SelectorCache, StateChange, StateConfig, Store,
};
use themes::{mood, site_theme, twentyfifteen, twentysixteen, Theme};

const JETPACK_SITE: u64 = 77203074;

fn wpcom() -> CollectionKey {
    CollectionKey::from("wpcom")
}

fn request(collection: CollectionKey, query: &Query) -> EntityAction<Theme> {
    EntityAction::ItemsRequest {
        collection,
        query: query.clone(),
    }
}

fn success(collection: CollectionKey, query: &Query, found: u64, items: Vec<Theme>) -> EntityAction<Theme> {
    EntityAction::ItemsRequestSuccess {
        collection,
        query: query.clone(),
        found: Some(found),
        items,
    }
}

#[test]
fn request_flow_tracks_flags_and_results() {
    let query = Query::new().with_search("Twenty").with_number(2);
    let state = EntityState::<Theme>::default();

    let state = reduce(&state, &request(wpcom(), &query));
    assert!(is_requesting_items_for_query(&state, &wpcom(), &query));
    assert!(get_items_for_query(&state, &wpcom(), &query).is_none());

    let state = reduce(
        &state,
        &success(wpcom(), &query, 3, vec![twentysixteen(), twentyfifteen()]),
    );
    assert!(!is_requesting_items_for_query(&state, &wpcom(), &query));
    assert_eq!(get_items_for_query(&state, &wpcom(), &query).unwrap().len(), 2);
    assert_eq!(get_last_page_for_query(&state, &wpcom(), &query), Some(2));
    assert_eq!(is_last_page_for_query(&state, &wpcom(), &query), Some(false));
    // Page two is outstanding.
    assert!(get_items_for_query_ignoring_page(&state, &wpcom(), &query).is_none());

    let second = query.clone().with_page(2);
    let state = reduce(&state, &request(wpcom(), &second));
    assert!(is_requesting_items_for_query_ignoring_page(&state, &wpcom(), &query));
    let state = reduce(&state, &success(wpcom(), &second, 3, vec![mood()]));
    assert!(!is_requesting_items_for_query_ignoring_page(&state, &wpcom(), &query));
    assert_eq!(
        get_items_for_query_ignoring_page(&state, &wpcom(), &query)
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn collections_are_kept_apart() {
    let state = reduce(
        &EntityState::<Theme>::default(),
        &EntityAction::ItemsReceive {
            items: vec![twentysixteen(), site_theme(JETPACK_SITE, "twentysixteen", "Twenty Sixteen")],
        },
    );

    assert_eq!(get_collection_items(&state, &wpcom()).len(), 1);
    assert_eq!(
        get_collection_items(&state, &CollectionKey::Site(JETPACK_SITE)).len(),
        1
    );
    let jetpack = get_item_by_global_id(&state, "77203074-twentysixteen").unwrap();
    assert_eq!(jetpack.site, CollectionKey::Site(JETPACK_SITE));
}

#[test]
fn query_less_receive_updates_matching_queries() {
    let config = StateConfig::default().with_matcher(Arc::new(AttributeMatcher::new(["name"])));
    let query = Query::new().with_search("Twenty");
    let state = reduce(
        &EntityState::new(config),
        &success(wpcom(), &query, 1, vec![twentysixteen()]),
    );

    let state = reduce(
        &state,
        &EntityAction::ItemsReceive {
            items: vec![twentyfifteen(), mood()],
        },
    );
    assert_eq!(get_items_for_query(&state, &wpcom(), &query).unwrap().len(), 2);
}

#[test]
fn delete_removes_item_from_results() {
    let query = Query::new();
    let state = reduce(
        &EntityState::<Theme>::default(),
        &success(wpcom(), &query, 2, vec![twentysixteen(), mood()]),
    );
    let state = reduce(
        &state,
        &EntityAction::ItemDeleteSuccess {
            collection: wpcom(),
            id: ItemId::from("mood"),
        },
    );
    let items = get_items_for_query(&state, &wpcom(), &query).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "twentysixteen");
}

#[test]
fn selector_cache_is_stable_across_unrelated_actions() {
    let cache = SelectorCache::new();
    let query = Query::new().with_search("Twenty");
    let state = reduce(
        &EntityState::<Theme>::default(),
        &success(wpcom(), &query, 1, vec![twentysixteen()]),
    );
    let before = cache.items_for_query(&state, &wpcom(), &query).unwrap();

    let state = reduce(
        &state,
        &EntityAction::ItemRequest {
            collection: wpcom(),
            id: ItemId::from("mood"),
        },
    );
    let after = cache.items_for_query(&state, &wpcom(), &query).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn store_announces_each_change() {
    let store = Store::<Theme>::default();
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    store
        .subscribe(move |change: StateChange| sink.lock().unwrap().push(change.action))
        .unwrap();

    let query = Query::new();
    for action in [
        request(wpcom(), &query),
        success(wpcom(), &query, 1, vec![mood()]),
        EntityAction::Clear,
    ] {
        for handle in store.dispatch(action).unwrap() {
            handle.join().unwrap();
        }
    }

    assert_eq!(
        *changes.lock().unwrap(),
        vec!["ITEMS_REQUEST", "ITEMS_REQUEST_SUCCESS", "CLEAR"]
    );
    assert!(store.state().unwrap().is_empty());
}
