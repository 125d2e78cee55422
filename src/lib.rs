use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod models;
pub mod reference;
pub mod remote;
pub mod sync;

use config::LibraryConfig;
use db::{column_json, column_text, LocalStore};
use enrich::{enrich_author, enrich_book, enrich_search_results, EnrichmentResult};
use error::{ConfigError, RemoteError, ToolError};
use models::{Author, Category};
use reference::ReferenceComposer;
use remote::{CatalogClient, SearchQuery};
use rusqlite::types::Value as SqlValue;

/// Tool names accepted by [`LibraryService::call`].
pub const TOOL_NAMES: [&str; 7] = [
    "get_filter_ids",
    "get_book_details",
    "get_page_content",
    "search_library",
    "get_author_bio",
    "list_all_categories",
    "list_all_authors",
];

pub const NO_FILTER_IDS_FOUND: &str = "No IDs found for the given category or author name.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterIds {
    Found {
        category_ids: Option<String>,
        author_ids: Option<String>,
    },
    NotFound {
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct AuthorList {
    pub authors: Vec<Author>,
}

#[derive(Deserialize)]
struct FilterIdsArgs {
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

#[derive(Deserialize)]
struct BookDetailsArgs {
    book_id: i64,
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    ver: Option<u32>,
}

#[derive(Deserialize)]
struct PageContentArgs {
    book_id: i64,
    pg: i64,
    #[serde(default)]
    ver: Option<u32>,
}

#[derive(Deserialize)]
struct AuthorBioArgs {
    #[serde(alias = "id")]
    author_id: i64,
    #[serde(default)]
    ver: Option<u32>,
}

/// The library tools: catalog calls, cache reconciliation and enrichment.
///
/// Owns its catalog client and store handle; nothing is shared through
/// globals. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct LibraryService {
    catalog: CatalogClient,
    store: LocalStore,
    composer: ReferenceComposer,
    api_version: u32,
}

impl LibraryService {
    pub fn new(
        catalog: CatalogClient,
        store: LocalStore,
        composer: ReferenceComposer,
        api_version: u32,
    ) -> Self {
        Self {
            catalog,
            store,
            composer,
            api_version,
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            CatalogClient::new(config)?,
            LocalStore::new(config.db_path.clone()),
            ReferenceComposer::new(config.reference_base_url.clone()),
            config.api_version,
        ))
    }

    /// Looks up category and author ids by partial name. Ids come back
    /// comma separated, ready to pass as search filters.
    pub async fn get_filter_ids(
        &self,
        category_name: Option<&str>,
        author_name: Option<&str>,
    ) -> FilterIds {
        let category_name = category_name.map(str::trim).filter(|name| !name.is_empty());
        let author_name = author_name.map(str::trim).filter(|name| !name.is_empty());

        let category_ids = match category_name {
            Some(name) => {
                self.ids_like("SELECT id FROM cats WHERE name LIKE ?1", "category", name)
                    .await
            }
            None => None,
        };
        let author_ids = match author_name {
            Some(name) => {
                self.ids_like("SELECT id FROM authors WHERE name LIKE ?1", "author", name)
                    .await
            }
            None => None,
        };

        if category_ids.is_none() && author_ids.is_none() {
            return FilterIds::NotFound {
                message: NO_FILTER_IDS_FOUND.to_string(),
            };
        }
        FilterIds::Found {
            category_ids,
            author_ids,
        }
    }

    async fn ids_like(&self, sql: &'static str, kind: &str, name: &str) -> Option<String> {
        let rows = self
            .store
            .query(sql, vec![SqlValue::Text(format!("%{}%", name))], |row| {
                column_text(row, 0)
            })
            .await
            .unwrap_or_default();
        let ids: Vec<String> = rows.into_iter().flatten().collect();
        if ids.is_empty() {
            log::info!("[tools] no {} ids for name=\"{}\"", kind, name);
            return None;
        }
        let joined = ids.join(",");
        log::info!("[tools] {} ids \"{}\" for name=\"{}\"", kind, joined, name);
        Some(joined)
    }

    /// Fetches a book from the catalog, reconciles its PDF availability into
    /// the cache, then enriches the payload from the cache. Cache problems
    /// never turn a successful fetch into an error.
    pub async fn get_book_details(
        &self,
        book_id: i64,
        include: Option<&str>,
        ver: Option<u32>,
    ) -> Result<Value, ToolError> {
        let ver = ver.unwrap_or(self.api_version);
        let mut payload = self.catalog.get_book(book_id, include, ver).await?;
        if !payload.is_object() {
            return Err(RemoteError::Unexpected {
                message: format!("book {} payload is not a JSON object", book_id),
            }
            .into());
        }

        sync::reconcile_pdf_links(&self.store, book_id, &payload).await;
        if let Some(map) = payload.as_object_mut() {
            let result = enrich_book(&self.store, book_id, map).await;
            log::debug!(
                "[tools] book enrichment book_id={} report={:?}",
                book_id,
                result.report()
            );
        }
        Ok(payload)
    }

    pub async fn get_page_content(
        &self,
        book_id: i64,
        page: i64,
        ver: Option<u32>,
    ) -> Result<Value, ToolError> {
        let ver = ver.unwrap_or(self.api_version);
        Ok(self.catalog.get_page(book_id, page, ver).await?)
    }

    /// Runs a catalog search and enriches every result item, including its
    /// citation. The batch runs on a worker thread over one connection.
    pub async fn search_library(&self, mut query: SearchQuery) -> Result<Value, ToolError> {
        query.validate().map_err(ToolError::invalid_argument)?;
        query.ver.get_or_insert(self.api_version);

        let mut payload = self.catalog.search(&query).await?;
        if let Value::Object(map) = &mut payload {
            self.enrich_search_payload(map).await;
        }
        Ok(payload)
    }

    async fn enrich_search_payload(&self, payload: &mut Map<String, Value>) {
        let Some(Value::Array(items)) = payload.get("data") else {
            return;
        };
        let mut items = items.clone();
        let store = self.store.clone();
        let composer = self.composer.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let result = match store.open_batch_connection() {
                Ok(conn) => enrich_search_results(&conn, &mut items, &composer),
                Err(error) => EnrichmentResult::Aborted {
                    report: Default::default(),
                    error,
                },
            };
            (items, result)
        })
        .await;

        match joined {
            Ok((items, result)) => {
                payload.insert("data".into(), Value::Array(items));
                match result.error() {
                    Some(error) => {
                        log::warn!(
                            "[tools] search enrichment aborted report={:?} err=\"{}\"",
                            result.report(),
                            error
                        );
                        payload.insert(
                            "enrichment_error".into(),
                            Value::String(error.to_string()),
                        );
                    }
                    None => {
                        log::info!("[tools] search enrichment done report={:?}", result.report());
                    }
                }
            }
            Err(err) => {
                log::error!("[tools] search enrichment worker failed err=\"{}\"", err);
                payload.insert("enrichment_error".into(), Value::String(err.to_string()));
            }
        }
    }

    pub async fn get_author_bio(
        &self,
        author_id: i64,
        ver: Option<u32>,
    ) -> Result<Value, ToolError> {
        let ver = ver.unwrap_or(self.api_version);
        let mut payload = self.catalog.get_author(author_id, ver).await?;
        let Some(map) = payload.as_object_mut() else {
            return Err(RemoteError::Unexpected {
                message: format!("author {} payload is not a JSON object", author_id),
            }
            .into());
        };
        enrich_author(&self.store, author_id, map).await;
        Ok(payload)
    }

    pub async fn list_all_categories(&self) -> Result<CategoryList, ToolError> {
        let categories = self
            .store
            .query("SELECT id, name FROM cats ORDER BY name ASC", vec![], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: column_text(row, 1)?.unwrap_or_default(),
                })
            })
            .await
            .map_err(|err| {
                ToolError::new("Database query failed for categories.", err.to_string())
            })?;
        Ok(CategoryList { categories })
    }

    pub async fn list_all_authors(&self) -> Result<AuthorList, ToolError> {
        let authors = self
            .store
            .query(
                "SELECT id, name, death, death_inexact_label FROM authors ORDER BY name ASC",
                vec![],
                |row| {
                    Ok(Author {
                        id: row.get(0)?,
                        name: column_text(row, 1)?.unwrap_or_default(),
                        death: Some(column_json(row, 2)?).filter(|value| !value.is_null()),
                        death_inexact_label: Some(column_json(row, 3)?)
                            .filter(|value| !value.is_null()),
                    })
                },
            )
            .await
            .map_err(|err| ToolError::new("Database query failed for authors.", err.to_string()))?;
        Ok(AuthorList { authors })
    }

    /// Runs a tool by name with JSON arguments and returns its JSON result,
    /// or an `{error, details}` object.
    pub async fn call(&self, tool: &str, args: Value) -> Value {
        let args = if args.is_null() { json!({}) } else { args };
        let result = match tool {
            "get_filter_ids" => match parse_args::<FilterIdsArgs>(args) {
                Ok(args) => to_json(Ok(self
                    .get_filter_ids(args.category_name.as_deref(), args.author_name.as_deref())
                    .await)),
                Err(err) => Err(err),
            },
            "get_book_details" => match parse_args::<BookDetailsArgs>(args) {
                Ok(args) => {
                    self.get_book_details(args.book_id, args.include.as_deref(), args.ver)
                        .await
                }
                Err(err) => Err(err),
            },
            "get_page_content" => match parse_args::<PageContentArgs>(args) {
                Ok(args) => self.get_page_content(args.book_id, args.pg, args.ver).await,
                Err(err) => Err(err),
            },
            "search_library" => match parse_args::<SearchQuery>(args) {
                Ok(query) => self.search_library(query).await,
                Err(err) => Err(err),
            },
            "get_author_bio" => match parse_args::<AuthorBioArgs>(args) {
                Ok(args) => self.get_author_bio(args.author_id, args.ver).await,
                Err(err) => Err(err),
            },
            "list_all_categories" => to_json(self.list_all_categories().await),
            "list_all_authors" => to_json(self.list_all_authors().await),
            other => Err(ToolError::new(
                "Unknown tool",
                format!("no tool named {:?}; available: {}", other, TOOL_NAMES.join(", ")),
            )),
        };

        match result {
            Ok(value) => value,
            Err(err) => {
                log::warn!(
                    "[tools] {} failed error=\"{}\" details=\"{}\"",
                    tool,
                    err.error,
                    err.details
                );
                serde_json::to_value(&err)
                    .unwrap_or_else(|_| json!({"error": err.error, "details": err.details}))
            }
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|err| ToolError::invalid_argument(err.to_string()))
}

fn to_json<T: Serialize>(result: Result<T, ToolError>) -> Result<Value, ToolError> {
    let value = result?;
    serde_json::to_value(value)
        .map_err(|err| ToolError::new("Failed to encode tool result.", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{FilterIds, LibraryService, NO_FILTER_IDS_FOUND};
    use crate::config::LibraryConfig;
    use crate::db::init_schema;
    use serde_json::json;

    fn service_with_store() -> (tempfile::TempDir, LibraryService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("library.db");
        let conn = init_schema(&path).expect("schema");
        conn.execute_batch(
            "INSERT INTO cats (id, name) VALUES (123, 'Fiqih'), (5, 'Aqidah');
             INSERT INTO authors (id, name, death, death_inexact_label)
                VALUES (456, 'Al-Ghazali', 505, NULL), (12, 'Abu Hanifa', 150, 'circa');",
        )
        .expect("seed");
        let config = LibraryConfig {
            // Nothing listens here; these tests never reach the catalog.
            api_base_url: "http://127.0.0.1:9".to_string(),
            db_path: path,
            ..LibraryConfig::default()
        };
        let service = LibraryService::from_config(&config).expect("service");
        (dir, service)
    }

    #[tokio::test]
    async fn filter_ids_for_category_only() {
        let (_dir, service) = service_with_store();
        let ids = service.get_filter_ids(Some("Fiqih"), None).await;

        assert_eq!(
            ids,
            FilterIds::Found {
                category_ids: Some("123".to_string()),
                author_ids: None,
            }
        );
        assert_eq!(
            serde_json::to_value(&ids).expect("json"),
            json!({"category_ids": "123", "author_ids": null})
        );
    }

    #[tokio::test]
    async fn filter_ids_match_partial_names() {
        let (_dir, service) = service_with_store();
        let ids = service.get_filter_ids(Some("id"), Some("Ghaz")).await;

        assert_eq!(
            ids,
            FilterIds::Found {
                category_ids: Some("5".to_string()),
                author_ids: Some("456".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn filter_ids_without_matches_returns_message() {
        let (_dir, service) = service_with_store();
        let ids = service.get_filter_ids(Some("NonExistent"), Some("Unknown")).await;

        assert_eq!(
            serde_json::to_value(&ids).expect("json"),
            json!({"message": NO_FILTER_IDS_FOUND})
        );
        assert!(matches!(
            service.get_filter_ids(None, Some("  ")).await,
            FilterIds::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn lists_are_ordered_by_name() {
        let (_dir, service) = service_with_store();

        let categories = service.call("list_all_categories", json!(null)).await;
        assert_eq!(
            categories,
            json!({"categories": [{"id": 5, "name": "Aqidah"}, {"id": 123, "name": "Fiqih"}]})
        );

        let authors = service.call("list_all_authors", json!({})).await;
        assert_eq!(
            authors,
            json!({"authors": [
                {"id": 12, "name": "Abu Hanifa", "death": 150, "death_inexact_label": "circa"},
                {"id": 456, "name": "Al-Ghazali", "death": 505, "death_inexact_label": null}
            ]})
        );
    }

    #[tokio::test]
    async fn list_reports_store_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LibraryConfig {
            db_path: dir.path().join("absent.db"),
            ..LibraryConfig::default()
        };
        let service = LibraryService::from_config(&config).expect("service");

        let result = service.call("list_all_categories", json!({})).await;
        assert_eq!(result["error"], json!("Database query failed for categories."));
        assert!(result["details"].is_string());
    }

    #[tokio::test]
    async fn call_rejects_unknown_tools_and_bad_arguments() {
        let (_dir, service) = service_with_store();

        let unknown = service.call("delete_everything", json!({})).await;
        assert_eq!(unknown["error"], json!("Unknown tool"));

        let bad = service.call("get_book_details", json!({"book_id": "abc"})).await;
        assert_eq!(bad["error"], json!("Invalid argument"));

        let bad_search = service.call("search_library", json!({"q": "x", "precision": 5})).await;
        assert_eq!(bad_search["error"], json!("Invalid argument"));
    }
}
