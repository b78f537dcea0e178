//! Integration tests for persisting and restoring query managers and
//! entity state.


use entity_query_cache::{
    selectors, CacheError, CollectionKey, EntityAction, EntityState, ItemId, ManagerOptions,
    PersistedManager, Query, QueryManager, ReceiveOptions, StateConfig,
};
use serde_json::json;
use themes::{mood, twentyfifteen, twentysixteen, wpcom_theme, Theme};

fn wpcom() -> CollectionKey {
    CollectionKey::from("wpcom")
}

#[test]
fn restored_manager_answers_like_the_source() {
    let search = Query::new().with_search("Twenty").with_number(1);
    let manager = QueryManager::<Theme>::default()
        .receive(
            [twentysixteen()],
            ReceiveOptions::for_query(search.clone()).found(2),
        )
        .receive([mood()], ReceiveOptions::default());

    let value = manager.to_persisted().to_value().unwrap();
    let restored = QueryManager::<Theme>::try_restore(&value, ManagerOptions::default()).unwrap();

    for query in [
        search.clone(),
        search.clone().with_page(2),
        Query::new(),
    ] {
        assert_eq!(restored.get_items(&query), manager.get_items(&query));
        assert_eq!(restored.get_found(&query), manager.get_found(&query));
        assert_eq!(
            restored.get_items_ignoring_page(&query),
            manager.get_items_ignoring_page(&query)
        );
    }
    assert_eq!(restored.get_all_items(), manager.get_all_items());
}

#[test]
fn unfetched_slots_persist_as_null() {
    let page = Query::new().with_search("Sweet").with_number(1).with_page(2);
    let manager = QueryManager::<Theme>::default().receive(
        [wpcom_theme("b", "Sweet B")],
        ReceiveOptions::for_query(page).found(3),
    );

    let value = manager.to_persisted().to_value().unwrap();
    assert_eq!(
        value["queries"]["{\"search\":\"Sweet\"}"],
        json!({ "item_keys": [null, "b"], "found": 3 })
    );
}

#[test]
fn schema_violation_names_the_path() {
    let value = json!({
        "items": {},
        "queries": { "{}": { "item_keys": [], "found": "many" } }
    });
    match PersistedManager::<Theme>::from_value(&value) {
        Err(CacheError::Schema(violation)) => {
            assert!(violation.path.contains("found"), "path was {}", violation.path)
        }
        other => panic!("expected a schema violation, got {:?}", other),
    }
}

#[test]
fn state_round_trip_keeps_items_and_queries() {
    let search = Query::new().with_search("Twenty");
    let state = entity_query_cache::reduce(
        &EntityState::<Theme>::default(),
        &EntityAction::ItemsRequestSuccess {
            collection: wpcom(),
            query: search.clone(),
            found: Some(2),
            items: vec![twentysixteen(), twentyfifteen()],
        },
    );

    let value = state.to_value().unwrap();
    let restored = EntityState::<Theme>::restore(&value, StateConfig::default());

    let items = selectors::get_items_for_query(&restored, &wpcom(), &search).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        selectors::get_found_for_query(&restored, &wpcom(), &search),
        Some(2)
    );
    assert!(selectors::get_collection_item(&restored, &wpcom(), &ItemId::from("twentyfifteen")).is_some());
}

#[test]
fn corrupt_state_restores_empty() {
    let corrupt = [
        json!(null),
        json!({ "wpcom": { "items": { "mood": "Mood" }, "queries": {} } }),
        json!({ "wpcom": { "items": {}, "queries": { "not a query": { "item_keys": [] } } } }),
        json!({ "wpcom": { "items": {}, "queries": { "{}": { "item_keys": ["mood"] } } } }),
    ];
    for value in corrupt {
        let restored = EntityState::<Theme>::restore(&value, StateConfig::default());
        assert!(restored.is_empty(), "restored {}", value);
    }
}
