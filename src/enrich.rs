//! Attaches locally known names and labels to catalog payloads.

use crate::db::{
    column_f64, column_i64, column_json, column_text, compact_sql, LocalStore,
};
use crate::error::LocalStoreError;
use crate::models::{Author, Book};
use crate::reference::ReferenceComposer;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

pub const BOOK_NOT_FOUND: &str = "Book ID not found in local database.";
pub const AUTHOR_NOT_FOUND: &str = "Author ID not found in local database.";
pub const LOOKUP_FAILED: &str = "Local database lookup failed.";

const SEARCH_ITEM_SQL: &str = "SELECT b.name, a.name, c.name, b.pdf_links, b.info_long
     FROM books b
     LEFT JOIN authors a ON b.author_id = a.id
     LEFT JOIN cats c ON b.cat_id = c.id
     WHERE b.id = ?1";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnrichmentReport {
    /// Items (or lookups, for single records) that were attempted.
    pub processed: usize,
    pub matched: usize,
    pub missing: usize,
    /// Lookups that failed against the store and were skipped.
    pub failed_lookups: usize,
}

#[derive(Debug)]
pub enum EnrichmentResult {
    /// Every lookup ran. Fields that could not be resolved were left off.
    Partial(EnrichmentReport),
    /// A store failure stopped a batch; annotations already applied stay.
    Aborted {
        report: EnrichmentReport,
        error: LocalStoreError,
    },
}

impl EnrichmentResult {
    pub fn report(&self) -> &EnrichmentReport {
        match self {
            EnrichmentResult::Partial(report) => report,
            EnrichmentResult::Aborted { report, .. } => report,
        }
    }

    pub fn error(&self) -> Option<&LocalStoreError> {
        match self {
            EnrichmentResult::Partial(_) => None,
            EnrichmentResult::Aborted { error, .. } => Some(error),
        }
    }
}

async fn load_book(store: &LocalStore, book_id: i64) -> Result<Option<Book>, LocalStoreError> {
    let rows = store
        .query(
            "SELECT id, name, author_id, cat_id, pdf_links, info_long, printed, size
             FROM books WHERE id = ?1",
            vec![SqlValue::Integer(book_id)],
            |row| {
                Ok(Book {
                    id: row.get(0)?,
                    name: column_text(row, 1)?,
                    author_id: column_i64(row, 2)?,
                    cat_id: column_i64(row, 3)?,
                    pdf_links: column_text(row, 4)?,
                    info_long: column_text(row, 5)?,
                    printed: column_text(row, 6)?,
                    size: column_f64(row, 7)?,
                })
            },
        )
        .await?;
    Ok(rows.into_iter().next())
}

async fn load_author(store: &LocalStore, author_id: i64) -> Result<Option<Author>, LocalStoreError> {
    let rows = store
        .query(
            "SELECT id, name, death, death_inexact_label FROM authors WHERE id = ?1",
            vec![SqlValue::Integer(author_id)],
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
        .await?;
    Ok(rows.into_iter().next())
}

async fn load_category_name(
    store: &LocalStore,
    cat_id: i64,
) -> Result<Option<String>, LocalStoreError> {
    let rows = store
        .query(
            "SELECT name FROM cats WHERE id = ?1",
            vec![SqlValue::Integer(cat_id)],
            |row| column_text(row, 0),
        )
        .await?;
    Ok(rows.into_iter().next().flatten())
}

fn optional_json(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// Annotates a book detail payload from the `books` row and, when the row
/// points at them, the matching `authors` and `cats` rows. Lookups run one
/// after another and a failing lookup only drops its own fields.
pub async fn enrich_book(
    store: &LocalStore,
    book_id: i64,
    payload: &mut Map<String, Value>,
) -> EnrichmentResult {
    let mut report = EnrichmentReport {
        processed: 1,
        ..EnrichmentReport::default()
    };

    let book = match load_book(store, book_id).await {
        Ok(Some(book)) => book,
        Ok(None) => {
            report.missing += 1;
            payload.insert("local_db_status".into(), Value::from(BOOK_NOT_FOUND));
            return EnrichmentResult::Partial(report);
        }
        Err(_) => {
            report.failed_lookups += 1;
            payload.insert("local_db_status".into(), Value::from(LOOKUP_FAILED));
            return EnrichmentResult::Partial(report);
        }
    };

    report.matched += 1;
    payload.insert("local_book_name".into(), optional_json(book.name));
    payload.insert("local_pdf_links".into(), optional_json(book.pdf_links));
    payload.insert("local_info_long".into(), optional_json(book.info_long));
    payload.insert("local_printed".into(), optional_json(book.printed));
    payload.insert(
        "local_size_mb".into(),
        book.size.map(Value::from).unwrap_or(Value::Null),
    );

    if let Some(author_id) = book.author_id {
        match load_author(store, author_id).await {
            Ok(Some(author)) => {
                payload.insert("local_author_name".into(), Value::String(author.name));
                payload.insert(
                    "local_author_death".into(),
                    author.death.unwrap_or(Value::Null),
                );
            }
            Ok(None) => {}
            Err(_) => report.failed_lookups += 1,
        }
    }

    if let Some(cat_id) = book.cat_id {
        match load_category_name(store, cat_id).await {
            Ok(Some(name)) => {
                payload.insert("local_category_name".into(), Value::String(name));
            }
            Ok(None) => {}
            Err(_) => report.failed_lookups += 1,
        }
    }

    EnrichmentResult::Partial(report)
}

/// Annotates an author payload from the `authors` row.
pub async fn enrich_author(
    store: &LocalStore,
    author_id: i64,
    payload: &mut Map<String, Value>,
) -> EnrichmentResult {
    let mut report = EnrichmentReport {
        processed: 1,
        ..EnrichmentReport::default()
    };
    match load_author(store, author_id).await {
        Ok(Some(author)) => {
            report.matched += 1;
            payload.insert("local_author_name".into(), Value::String(author.name));
            payload.insert(
                "local_author_death".into(),
                author.death.unwrap_or(Value::Null),
            );
            payload.insert(
                "local_author_death_label".into(),
                author.death_inexact_label.unwrap_or(Value::Null),
            );
        }
        Ok(None) => {
            report.missing += 1;
            payload.insert("local_db_status".into(), Value::from(AUTHOR_NOT_FOUND));
        }
        Err(_) => {
            report.failed_lookups += 1;
            payload.insert("local_db_status".into(), Value::from(LOOKUP_FAILED));
        }
    }
    EnrichmentResult::Partial(report)
}

/// Book id of a search item as a bind parameter; `None` when absent or empty.
fn item_book_id(item: &Map<String, Value>) -> Option<SqlValue> {
    match item.get("book_id")? {
        Value::Number(number) => match number.as_i64() {
            Some(0) => None,
            Some(id) => Some(SqlValue::Integer(id)),
            None => Some(SqlValue::Real(number.as_f64()?)),
        },
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(
                    trimmed
                        .parse::<i64>()
                        .map(SqlValue::Integer)
                        .unwrap_or_else(|_| SqlValue::Text(trimmed.to_string())),
                )
            }
        }
        _ => None,
    }
}

/// Enriches search result items in place over one connection, then writes
/// each item's `reference_info`. A store failure stops the batch; items
/// after the failing one are left untouched.
///
/// Blocking: call from a worker thread.
pub fn enrich_search_results(
    conn: &Connection,
    items: &mut [Value],
    composer: &ReferenceComposer,
) -> EnrichmentResult {
    let mut report = EnrichmentReport::default();
    let mut stmt = match conn.prepare(SEARCH_ITEM_SQL) {
        Ok(stmt) => stmt,
        Err(err) => {
            log::error!(
                "[enrich] batch prepare failed err=\"{}\" sql=\"{}\"",
                err,
                compact_sql(SEARCH_ITEM_SQL)
            );
            return EnrichmentResult::Aborted {
                report,
                error: err.into(),
            };
        }
    };

    for item in items.iter_mut() {
        let Some(item) = item.as_object_mut() else {
            continue;
        };
        report.processed += 1;

        if let Some(book_id) = item_book_id(item) {
            let found = stmt
                .query_row(params![book_id], |row| {
                    Ok((
                        column_text(row, 0)?,
                        column_text(row, 1)?,
                        column_text(row, 2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                })
                .optional();

            match found {
                Ok(Some((book_name, author_name, cat_name, pdf_links, info_long))) => {
                    report.matched += 1;
                    item.insert("local_book_name".into(), optional_json(book_name));
                    item.insert("local_author_name".into(), optional_json(author_name));
                    item.insert("local_category_name".into(), optional_json(cat_name));
                    item.insert("local_pdf_links".into(), optional_json(pdf_links));
                    item.insert("local_info_long".into(), optional_json(info_long));
                }
                Ok(None) => {
                    report.missing += 1;
                    let shown = present_id(item);
                    item.insert(
                        "local_db_status".into(),
                        Value::String(format!("Book ID {} not found locally.", shown)),
                    );
                }
                Err(err) => {
                    log::error!(
                        "[enrich] batch lookup failed err=\"{}\" sql=\"{}\" params=[{:?}]",
                        err,
                        compact_sql(SEARCH_ITEM_SQL),
                        book_id
                    );
                    return EnrichmentResult::Aborted {
                        report,
                        error: err.into(),
                    };
                }
            }
        }

        let reference = composer.compose(item);
        item.insert("reference_info".into(), Value::String(reference));
    }

    EnrichmentResult::Partial(report)
}

fn present_id(item: &Map<String, Value>) -> String {
    crate::reference::present(item.get("book_id")).unwrap_or_default()
}
