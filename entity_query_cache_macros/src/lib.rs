mod item;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Item)]
// ============================================================================

/// Derive macro for the `Item` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, PartialEq, Serialize, Deserialize, Item)]
/// struct Theme {
///     #[item(id)]
///     #[serde(rename = "ID")]
///     pub id: u64,
///     #[item(collection)]
///     pub site_id: u64,
///     #[item(global_id)]
///     pub global_id: String,
///     pub title: String,
/// }
///
/// #[derive(Clone, PartialEq, Serialize, Deserialize, Item)]
/// #[item(collection = "wpcom")]
/// struct WpcomTheme {
///     pub id: String,
///     pub name: String,
/// }
/// ```
///
/// - `#[item(id)]` marks the identifier field. If omitted, defaults to a
///   field named `id`. The field type must convert into `ItemId`.
/// - `#[item(collection)]` marks the field naming the owning collection.
///   Alternatively `#[item(collection = "...")]` on the struct fixes the
///   collection for every instance.
/// - `#[item(global_id)]` marks an optional cross-collection identifier
///   (`String` or `Option<String>`).
#[proc_macro_derive(Item, attributes(item))]
pub fn derive_item(input: TokenStream) -> TokenStream {
    item::derive_item(input)
}
