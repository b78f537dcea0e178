#![allow(dead_code)]

use entity_query_cache::{CollectionKey, Item};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Item)]
pub struct Theme {
    pub id: String,
    #[item(collection)]
    pub site: CollectionKey,
    #[item(global_id)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
}

pub fn wpcom_theme(id: &str, name: &str) -> Theme {
    Theme {
        id: id.to_string(),
        site: CollectionKey::from("wpcom"),
        global_id: None,
        name: name.to_string(),
        author: "the WordPress team".to_string(),
        date: String::new(),
    }
}

pub fn dated_theme(id: &str, name: &str, date: &str) -> Theme {
    Theme {
        date: date.to_string(),
        ..wpcom_theme(id, name)
    }
}

pub fn twentysixteen() -> Theme {
    wpcom_theme("twentysixteen", "Twenty Sixteen")
}

pub fn twentyfifteen() -> Theme {
    wpcom_theme("twentyfifteen", "Twenty Fifteen")
}

pub fn mood() -> Theme {
    wpcom_theme("mood", "Mood")
}

/// A theme installed on a Jetpack site, addressable by a global ID.
pub fn site_theme(site: u64, id: &str, name: &str) -> Theme {
    Theme {
        site: CollectionKey::Site(site),
        global_id: Some(format!("{}-{}", site, id)),
        ..wpcom_theme(id, name)
    }
}
