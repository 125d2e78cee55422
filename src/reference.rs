//! Builds the `reference_info` citation for a search result item.
//!
//! The citation is assembled from whatever is known about the item, local
//! cache fields first and the item's own `meta` blob second. Missing or
//! unreadable metadata only drops the affected parts.

use serde_json::{Map, Value};

pub const REFERENCE_PREFIX: &str = "Sumber: ";
pub const REFERENCE_UNAVAILABLE: &str = "Detail referensi tidak tersedia";

/// The fields of a search item's `meta` blob that citations use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchMeta {
    pub vol: Option<String>,
    pub page: Option<String>,
    pub page_id: Option<String>,
    pub book_name: Option<String>,
    pub author_name: Option<String>,
}

impl SearchMeta {
    /// Accepts `meta` as a JSON-encoded string or as an inline object.
    /// Anything else, including a string that fails to parse, yields an
    /// empty `SearchMeta`.
    pub fn from_item_meta(meta: Option<&Value>) -> Self {
        match meta {
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(map)) => Self::from_object(&map),
                    Ok(_) => Self::default(),
                    Err(err) => {
                        log::warn!("[reference] unreadable meta err=\"{}\" meta={}", err, raw);
                        Self::default()
                    }
                }
            }
            Some(Value::Object(map)) => Self::from_object(map),
            _ => Self::default(),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Self {
        Self {
            vol: present(map.get("vol")),
            page: present(map.get("page")),
            page_id: present(map.get("page_id")),
            book_name: present(map.get("book_name")),
            author_name: present(map.get("author_name")),
        }
    }
}

/// Renders a value for display, treating empty strings, zero and `null`
/// as absent.
pub(crate) fn present(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => {
            let is_zero = number.as_f64().map(|value| value == 0.0).unwrap_or(false);
            (!is_zero).then(|| number.to_string())
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceComposer {
    link_base: String,
}

impl ReferenceComposer {
    pub fn new(link_base: impl Into<String>) -> Self {
        let link_base = link_base.into();
        Self {
            link_base: link_base.trim_end_matches('/').to_string(),
        }
    }

    /// Citation for an item that has already been through enrichment.
    pub fn compose(&self, item: &Map<String, Value>) -> String {
        let meta = SearchMeta::from_item_meta(item.get("meta"));
        let mut parts: Vec<String> = Vec::with_capacity(6);

        let book_name = present(item.get("local_book_name")).or_else(|| meta.book_name.clone());
        if let Some(name) = book_name {
            parts.push(format!("Kitab: {}", name));
        }
        let author_name =
            present(item.get("local_author_name")).or_else(|| meta.author_name.clone());
        if let Some(name) = author_name {
            parts.push(format!("Penulis: {}", name));
        }
        if let Some(name) = present(item.get("local_category_name")) {
            parts.push(format!("Kategori: {}", name));
        }
        if let Some(vol) = &meta.vol {
            parts.push(format!("Jilid: {}", vol));
        }
        if let Some(page) = &meta.page {
            parts.push(format!("Halaman: {}", page));
        }

        if parts.is_empty() {
            parts.push(REFERENCE_UNAVAILABLE.to_string());
        }
        if let Some(book_id) = present(item.get("book_id")) {
            parts.push(format!(
                "Link: {}",
                self.link(&book_id, meta.page_id.as_deref())
            ));
        }

        format!("{}{}", REFERENCE_PREFIX, parts.join(", "))
    }

    pub fn link(&self, book_id: &str, page_id: Option<&str>) -> String {
        match page_id {
            Some(page_id) => format!(
                "{}/book/{}/{}",
                self.link_base,
                urlencoding::encode(book_id),
                urlencoding::encode(page_id)
            ),
            None => format!("{}/book/{}", self.link_base, urlencoding::encode(book_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReferenceComposer, SearchMeta};
    use serde_json::{json, Map, Value};

    fn item(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn local_book_without_author_uses_meta_volume_and_page() {
        let composer = ReferenceComposer::new("https://shamela.ws");
        let item = item(json!({
            "book_id": 7,
            "local_book_name": "X",
            "local_author_name": null,
            "local_category_name": null,
            "meta": "{\"vol\": 2, \"page\": 15, \"page_id\": 99}"
        }));

        assert_eq!(
            composer.compose(&item),
            "Sumber: Kitab: X, Jilid: 2, Halaman: 15, Link: https://shamela.ws/book/7/99"
        );
    }

    #[test]
    fn unreadable_meta_without_local_match_falls_back_to_placeholder_and_book_link() {
        let composer = ReferenceComposer::new("https://shamela.ws/");
        let item = item(json!({
            "book_id": 7,
            "local_db_status": "Book ID 7 not found locally.",
            "meta": "{vol: 2"
        }));

        assert_eq!(
            composer.compose(&item),
            "Sumber: Detail referensi tidak tersedia, Link: https://shamela.ws/book/7"
        );
    }

    #[test]
    fn nothing_known_yields_placeholder_only() {
        let composer = ReferenceComposer::new("https://shamela.ws");
        assert_eq!(
            composer.compose(&Map::new()),
            "Sumber: Detail referensi tidak tersedia"
        );
    }

    #[test]
    fn meta_names_fill_in_when_local_names_are_missing() {
        let composer = ReferenceComposer::new("https://shamela.ws");
        let item = item(json!({
            "book_id": "12",
            "local_category_name": "الفقه",
            "meta": {"book_name": "الأم", "author_name": "الشافعي", "page": "3"}
        }));

        assert_eq!(
            composer.compose(&item),
            "Sumber: Kitab: الأم, Penulis: الشافعي, Kategori: الفقه, Halaman: 3, Link: https://shamela.ws/book/12"
        );
    }

    #[test]
    fn local_names_win_over_meta_names() {
        let composer = ReferenceComposer::new("https://shamela.ws");
        let item = item(json!({
            "local_book_name": "Local",
            "local_author_name": "Local Author",
            "meta": "{\"book_name\": \"Remote\", \"author_name\": \"Remote Author\"}"
        }));

        assert_eq!(
            composer.compose(&item),
            "Sumber: Kitab: Local, Penulis: Local Author"
        );
    }

    #[test]
    fn composing_twice_is_byte_identical() {
        let composer = ReferenceComposer::new("https://shamela.ws");
        let item = item(json!({
            "book_id": 9,
            "local_book_name": "Y",
            "meta": "{\"vol\": \"1\", \"page_id\": 5}"
        }));

        assert_eq!(composer.compose(&item), composer.compose(&item));
    }

    #[test]
    fn meta_parsing_ignores_non_object_and_zero_values() {
        assert_eq!(
            SearchMeta::from_item_meta(Some(&json!("[1, 2]"))),
            SearchMeta::default()
        );
        assert_eq!(SearchMeta::from_item_meta(Some(&json!(42))), SearchMeta::default());

        let meta = SearchMeta::from_item_meta(Some(&json!({"vol": 0, "page": "", "page_id": 4})));
        assert_eq!(meta.vol, None);
        assert_eq!(meta.page, None);
        assert_eq!(meta.page_id.as_deref(), Some("4"));
    }
}
