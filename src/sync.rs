use crate::db::LocalStore;
use crate::error::LocalStoreError;
use crate::models::PdfLinks;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// What a reconcile pass wrote for one book.
#[derive(Debug)]
pub enum SyncOutcome {
    PdfAvailable { links: PdfLinks, rows_changed: usize },
    PdfCleared { rows_changed: usize },
    WriteFailed(LocalStoreError),
}

/// Copies the catalog's PDF availability for `book_id` over the cached row.
///
/// Runs after every successful detail fetch. The cached `pdf_links` and
/// `has_pdf` are overwritten, never merged: a well formed `meta.pdf_links`
/// sets both, anything else clears both. Exactly one statement is issued.
pub async fn reconcile_pdf_links(
    store: &LocalStore,
    book_id: i64,
    payload: &Value,
) -> SyncOutcome {
    let raw = payload.get("meta").and_then(|meta| meta.get("pdf_links"));
    match raw.and_then(|raw| PdfLinks::from_value(raw).map(|links| (raw, links))) {
        Some((raw, links)) => {
            // Stored as received, including keys this crate does not read.
            let serialized = match serde_json::to_string(raw) {
                Ok(value) => value,
                Err(err) => return SyncOutcome::WriteFailed(LocalStoreError::from(err)),
            };
            let result = store
                .execute(
                    "UPDATE books SET pdf_links = ?1, has_pdf = 1 WHERE id = ?2",
                    vec![SqlValue::Text(serialized), SqlValue::Integer(book_id)],
                )
                .await;
            match result {
                Ok(rows_changed) => {
                    log::info!(
                        "[library-sync] pdf links refreshed book_id={} files={} rows={}",
                        book_id,
                        links.files.len(),
                        rows_changed
                    );
                    SyncOutcome::PdfAvailable { links, rows_changed }
                }
                Err(err) => {
                    log::warn!("[library-sync] pdf links write failed book_id={}", book_id);
                    SyncOutcome::WriteFailed(err)
                }
            }
        }
        None => {
            let result = store
                .execute(
                    "UPDATE books SET pdf_links = NULL, has_pdf = 0 WHERE id = ?1",
                    vec![SqlValue::Integer(book_id)],
                )
                .await;
            match result {
                Ok(rows_changed) => {
                    log::info!(
                        "[library-sync] no valid pdf links from catalog, cleared book_id={} rows={}",
                        book_id,
                        rows_changed
                    );
                    SyncOutcome::PdfCleared { rows_changed }
                }
                Err(err) => {
                    log::warn!("[library-sync] pdf links clear failed book_id={}", book_id);
                    SyncOutcome::WriteFailed(err)
                }
            }
        }
    }
}
