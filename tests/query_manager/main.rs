//! Integration tests for QueryManager (receive, pagination, matching).


use std::sync::Arc;

use entity_query_cache::{
    AttributeMatcher, ItemId, ManagerOptions, Query, QueryDefaults, QueryManager, ReceiveOptions,
};
use themes::{dated_theme, mood, twentyfifteen, twentysixteen, wpcom_theme, Theme};

fn manager() -> QueryManager<Theme> {
    QueryManager::new(ManagerOptions::default())
}

fn ids(items: Option<Vec<Arc<Theme>>>) -> Option<Vec<String>> {
    items.map(|items| items.iter().map(|theme| theme.id.clone()).collect())
}

#[test]
fn received_theme_is_retrievable_by_id() {
    let manager = manager().receive([twentysixteen()], ReceiveOptions::default());

    let theme = manager.get_item(&ItemId::from("twentysixteen")).unwrap();
    assert_eq!(theme.name, "Twenty Sixteen");
    assert_eq!(manager.get_all_items().len(), 1);
}

#[test]
fn later_receive_replaces_earlier_version() {
    let manager = manager()
        .receive([twentysixteen()], ReceiveOptions::default())
        .receive(
            [wpcom_theme("twentysixteen", "Twenty Sixteen (updated)")],
            ReceiveOptions::default(),
        );
    assert_eq!(
        manager.get_item(&ItemId::from("twentysixteen")).unwrap().name,
        "Twenty Sixteen (updated)"
    );
}

#[test]
fn deep_equal_receive_keeps_references() {
    let first = manager().receive([twentysixteen(), mood()], ReceiveOptions::default());
    let before = first.get_item(&ItemId::from("mood")).unwrap();

    let second = first.receive([mood()], ReceiveOptions::default());
    let after = second.get_item(&ItemId::from("mood")).unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert!(second.ptr_eq(&first));
}

#[test]
fn search_query_results_in_server_order() {
    let query = Query::new().with_search("Twenty");
    let manager = manager().receive(
        [twentysixteen(), twentyfifteen()],
        ReceiveOptions::for_query(query.clone()).found(2),
    );

    assert_eq!(
        ids(manager.get_items(&query)),
        Some(vec!["twentysixteen".to_string(), "twentyfifteen".to_string()])
    );
    assert_eq!(manager.get_found(&query), Some(2));
    assert_eq!(manager.is_last_page(&query), Some(true));
    assert!(manager.get_items(&Query::new().with_search("Mood")).is_none());
}

#[test]
fn four_single_item_pages_fill_in_any_order() {
    let themes = [
        wpcom_theme("a", "Sweet A"),
        wpcom_theme("b", "Sweet B"),
        wpcom_theme("c", "Sweet C"),
        wpcom_theme("d", "Sweet D"),
    ];
    let page = |n: u64| Query::new().with_search("Sweet").with_number(1).with_page(n);

    let mut manager = manager().receive(
        [themes[2].clone()],
        ReceiveOptions::for_query(page(3)).found(4),
    );
    assert_eq!(ids(manager.get_items(&page(3))), Some(vec!["c".to_string()]));
    assert!(manager.get_items(&page(1)).is_none());
    assert!(manager.get_items_ignoring_page(&page(1)).is_none());
    assert_eq!(manager.get_number_of_pages(&page(1)), Some(4));

    for n in [1, 4, 2] {
        assert!(manager.get_items_ignoring_page(&page(1)).is_none());
        let index = usize::try_from(n - 1).unwrap();
        manager = manager.receive(
            [themes[index].clone()],
            ReceiveOptions::for_query(page(n)).found(4),
        );
    }

    assert_eq!(
        ids(manager.get_items_ignoring_page(&page(1))),
        Some(vec!["a", "b", "c", "d"].into_iter().map(String::from).collect())
    );
    // Any page of the same query answers the same concatenation.
    assert_eq!(
        ids(manager.get_items_ignoring_page(&page(3))),
        ids(manager.get_items_ignoring_page(&page(1)))
    );
}

#[test]
fn empty_result_has_one_page() {
    let query = Query::new().with_search("nothing");
    let manager = manager().receive(Vec::new(), ReceiveOptions::for_query(query.clone()).found(0));

    assert_eq!(ids(manager.get_items(&query)), Some(Vec::new()));
    assert_eq!(manager.get_number_of_pages(&query), Some(1));
    assert_eq!(manager.is_last_page(&query), Some(true));
}

#[test]
fn custom_defaults_change_page_size() {
    let options = ManagerOptions {
        defaults: QueryDefaults::standard().default_value("number", 2),
        ..ManagerOptions::default()
    };
    let query = Query::new().with_search("x");
    let manager = QueryManager::<Theme>::new(options).receive(
        [wpcom_theme("a", "x a"), wpcom_theme("b", "x b")],
        ReceiveOptions::for_query(query.clone()).found(5),
    );

    assert_eq!(manager.get_number_of_pages(&query), Some(3));
    assert_eq!(ids(manager.get_items(&query)).map(|ids| ids.len()), Some(2));
    assert!(manager.get_items(&query.clone().with_page(2)).is_none());
}

#[test]
fn matcher_inserts_in_query_order() {
    let query = Query::new().with_search("twenty").with("order_by", "date");
    let manager = manager()
        .with_matcher(Arc::new(AttributeMatcher::new(["name"])))
        .receive(
            [
                dated_theme("twentysixteen", "Twenty Sixteen", "2016-01-01"),
                dated_theme("twentyfourteen", "Twenty Fourteen", "2014-01-01"),
            ],
            ReceiveOptions::for_query(query.clone()).found(2),
        )
        .receive(
            [
                dated_theme("twentyfifteen", "Twenty Fifteen", "2015-01-01"),
                dated_theme("mood", "Mood", "2015-06-01"),
            ],
            ReceiveOptions::default(),
        );

    // Default order is DESC, newest first.
    assert_eq!(
        ids(manager.get_items(&query)),
        Some(vec![
            "twentysixteen".to_string(),
            "twentyfifteen".to_string(),
            "twentyfourteen".to_string()
        ])
    );
    assert_eq!(manager.get_found(&query), Some(3));
    assert!(manager.get_item(&ItemId::from("mood")).is_some());
}

#[test]
fn removed_item_leaves_every_query() {
    let search = Query::new().with_search("Twenty");
    let all = Query::new();
    let manager = manager()
        .receive(
            [twentysixteen(), twentyfifteen()],
            ReceiveOptions::for_query(search.clone()).found(2),
        )
        .receive(
            [twentysixteen(), twentyfifteen(), mood()],
            ReceiveOptions::for_query(all.clone()).found(3),
        )
        .remove_item(&ItemId::from("twentyfifteen"));

    assert_eq!(ids(manager.get_items(&search)), Some(vec!["twentysixteen".to_string()]));
    assert_eq!(manager.get_found(&all), Some(2));
    assert!(manager.get_item(&ItemId::from("twentyfifteen")).is_none());
}

#[test]
fn matcher_leaves_partially_fetched_pages_in_place() {
    let page = |n: u64| Query::new().with_search("Sweet").with_number(1).with_page(n);
    let manager = manager()
        .with_matcher(Arc::new(AttributeMatcher::new(["name"])))
        .receive(
            [wpcom_theme("c", "Sweet C")],
            ReceiveOptions::for_query(page(3)).found(4),
        )
        .receive([wpcom_theme("e", "Sweet E")], ReceiveOptions::default());

    assert_eq!(ids(manager.get_items(&page(3))), Some(vec!["c".to_string()]));
    assert!(manager.get_items(&page(1)).is_none());
    assert_eq!(manager.get_found(&page(1)), Some(4));
    assert_eq!(
        ids(manager.get_known_items_ignoring_page(&page(1))),
        Some(vec!["c".to_string()])
    );
    assert!(manager.get_item(&ItemId::from("e")).is_some());

    // Items that stop matching still leave the record.
    let manager = manager.receive([wpcom_theme("c", "Plain C")], ReceiveOptions::default());
    assert_eq!(ids(manager.get_known_items_ignoring_page(&page(1))), Some(Vec::new()));
    assert_eq!(manager.get_found(&page(1)), Some(3));
}

#[test]
fn page_past_found_is_empty_without_growing_the_record() {
    let query = Query::new().with_search("Twenty").with_number(20);
    let far = query.clone().with_page(u64::MAX);
    let manager = manager().receive(
        [twentysixteen()],
        ReceiveOptions::for_query(far.clone()).found(4),
    );

    assert_eq!(ids(manager.get_items(&far)), Some(Vec::new()));
    assert!(manager.get_items(&query).is_none());
    assert_eq!(ids(manager.get_known_items_ignoring_page(&query)), Some(Vec::new()));
    assert!(manager.get_item(&ItemId::from("twentysixteen")).is_some());
}

#[test]
fn huge_found_keeps_only_received_slots() {
    let query = Query::new().with_search("Twenty").with_number(20);
    let manager = manager().receive(
        [twentysixteen(), twentyfifteen()],
        ReceiveOptions::for_query(query.clone()).found(u64::MAX),
    );

    assert_eq!(manager.get_found(&query), Some(u64::MAX));
    assert!(manager.get_items(&query).is_none());
    assert!(manager.get_items_ignoring_page(&query).is_none());
    assert_eq!(
        ids(manager.get_known_items_ignoring_page(&query)),
        Some(vec!["twentysixteen".to_string(), "twentyfifteen".to_string()])
    );
    assert_eq!(manager.is_last_page(&query), Some(false));
}

#[test]
fn unanchored_far_page_is_not_recorded() {
    let far = Query::new().with_search("Twenty").with_page(u64::MAX);
    let manager = manager().receive([twentysixteen()], ReceiveOptions::for_query(far.clone()));

    assert!(manager.get_items(&far).is_none());
    assert!(manager.get_items(&Query::new().with_search("Twenty")).is_none());
    assert!(manager.get_item(&ItemId::from("twentysixteen")).is_some());
}

#[test]
fn pages_beyond_max_slots_are_not_recorded() {
    let options = ManagerOptions {
        max_slots: 4,
        ..ManagerOptions::default()
    };
    let page = |n: u64| Query::new().with_search("Sweet").with_number(2).with_page(n);
    let manager = QueryManager::<Theme>::new(options)
        .receive(
            [wpcom_theme("a", "Sweet A"), wpcom_theme("b", "Sweet B")],
            ReceiveOptions::for_query(page(1)).found(10),
        )
        .receive(
            [wpcom_theme("c", "Sweet C"), wpcom_theme("d", "Sweet D")],
            ReceiveOptions::for_query(page(2)).found(10),
        )
        .receive(
            [wpcom_theme("e", "Sweet E"), wpcom_theme("f", "Sweet F")],
            ReceiveOptions::for_query(page(3)).found(10),
        );

    assert_eq!(
        ids(manager.get_items(&page(2))),
        Some(vec!["c".to_string(), "d".to_string()])
    );
    assert!(manager.get_items(&page(3)).is_none());
    assert_eq!(manager.get_known_items_ignoring_page(&page(1)).map(|items| items.len()), Some(4));
    assert!(manager.get_item(&ItemId::from("e")).is_some());
}
