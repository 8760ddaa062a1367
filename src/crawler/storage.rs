//! Raw page persistence on top of the object store
//!
//! Pages for a site live under `pages/{site}/`, one JSON object per URL. The
//! object name is the URL without its scheme, with `/` and non-ASCII characters
//! replaced by `-`, so crawling the same URL again overwrites the old object.
//! Names longer than `MAX_NAME_LEN` are cut short and suffixed with a hash of
//! the full URL, keeping them within filesystem name limits.

use sha2::{Digest, Sha256};
use tracing::debug;

use super::RawPage;
use crate::storage::{ObjectStore, StorageError};

/// Longest object name kept verbatim, in bytes
const MAX_NAME_LEN: usize = 200;

/// Hex characters of the URL hash appended to shortened names
const HASH_LEN: usize = 16;

/// Prefix under which a site's raw pages are stored
pub fn site_prefix(site: &str) -> String {
    format!("pages/{}/", site)
}

/// Object key for a page of `site`
pub fn page_key(site: &str, url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let name: String = without_scheme
        .chars()
        .map(|c| if c == '/' || c == '\\' || !c.is_ascii() { '-' } else { c })
        .collect();

    if name.len() <= MAX_NAME_LEN {
        return format!("{}{}.json", site_prefix(site), name);
    }

    // Only ASCII is left in `name`, so any byte offset is a char boundary
    let hash = format!("{:x}", Sha256::digest(url.as_bytes()));
    let keep = MAX_NAME_LEN - HASH_LEN - 1;
    format!(
        "{}{}-{}.json",
        site_prefix(site),
        &name[..keep],
        &hash[..HASH_LEN]
    )
}

/// Write a raw page, superseding any earlier crawl of the same URL
pub async fn store_page<S: ObjectStore>(
    store: &S,
    site: &str,
    page: &RawPage,
) -> Result<String, StorageError> {
    let key = page_key(site, &page.url);
    let body = serde_json::to_vec(page).map_err(|source| StorageError::Malformed {
        key: key.clone(),
        source,
    })?;
    store.put(&key, body).await?;
    debug!("Stored {} as {}", page.url, key);
    Ok(key)
}

/// Read a raw page by object key
///
/// A missing object is `Ok(None)`; an object that is not a raw page is
/// `StorageError::Malformed`.
pub async fn load_page<S: ObjectStore>(store: &S, key: &str) -> Result<Option<RawPage>, StorageError> {
    let Some(body) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|source| StorageError::Malformed {
            key: key.to_string(),
            source,
        })
}

/// Keys of every stored page of `site`
pub async fn list_page_keys<S: ObjectStore>(store: &S, site: &str) -> Result<Vec<String>, StorageError> {
    let keys = store.list(&site_prefix(site)).await?;
    Ok(keys.into_iter().filter(|key| key.ends_with(".json")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsObjectStore;
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_page_key() {
        assert_eq!(
            page_key("Superside", "https://www.superside.com/blog/post"),
            "pages/Superside/www.superside.com-blog-post.json"
        );
        assert_eq!(page_key("acme", "https://acme.com/"), "pages/acme/acme.com-.json");
        assert_eq!(
            page_key("acme", "https://acme.com/caf\u{e9}"),
            "pages/acme/acme.com-caf-.json"
        );
    }

    #[test]
    fn test_long_page_key_is_shortened_with_hash() {
        let url = format!("https://ex.com/search?q={}", "a".repeat(300));
        let key = page_key("ex", &url);
        let name = key
            .strip_prefix("pages/ex/")
            .and_then(|name| name.strip_suffix(".json"))
            .unwrap();

        assert_eq!(name.len(), 200);
        assert!(name.starts_with("ex.com-search?q=aaa"));
        assert_eq!(key, page_key("ex", &url));

        // URLs sharing the long prefix still get their own objects
        let other = format!("{url}&page=2");
        assert_ne!(key, page_key("ex", &other));
    }

    #[tokio::test]
    async fn test_store_and_load_page_with_long_url() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");
        let page = RawPage::new(
            format!("https://ex.com/search?q={}", "a".repeat(300)),
            "<p>Results</p>",
        );

        let key = store_page(&store, "ex", &page).await.unwrap();
        assert_eq!(key, page_key("ex", &page.url));
        assert_eq!(load_page(&store, &key).await.unwrap().unwrap(), page);
    }

    #[test]
    fn test_page_key_without_scheme() {
        assert_eq!(page_key("acme", "acme.com/about"), "pages/acme/acme.com-about.json");
    }

    #[tokio::test]
    async fn test_store_and_load_page() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");
        let page = RawPage {
            url: "https://ex.com/about".to_string(),
            html: "<p>We build tools.</p>".to_string(),
            fetched_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        let key = store_page(&store, "ex", &page).await.unwrap();
        assert_eq!(key, "pages/ex/ex.com-about.json");

        let loaded = load_page(&store, &key).await.unwrap().unwrap();
        assert_eq!(loaded, page);
    }

    #[tokio::test]
    async fn test_recrawl_supersedes_previous_page() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        store_page(&store, "ex", &RawPage::new("https://ex.com/", "<p>old</p>"))
            .await
            .unwrap();
        let newer = RawPage::new("https://ex.com/", "<p>new</p>");
        store_page(&store, "ex", &newer).await.unwrap();

        let keys = list_page_keys(&store, "ex").await.unwrap();
        assert_eq!(keys.len(), 1);
        let loaded = load_page(&store, &keys[0]).await.unwrap().unwrap();
        assert_eq!(loaded.html, "<p>new</p>");
        assert!(loaded.fetched_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_load_malformed_page() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");
        store.put("pages/ex/broken.json", b"not json".to_vec()).await.unwrap();

        let result = load_page(&store, "pages/ex/broken.json").await;
        match result {
            Err(e @ StorageError::Malformed { .. }) => assert!(!e.is_fatal()),
            other => panic!("Expected Malformed error, got {:?}", other),
        }
        assert!(load_page(&store, "pages/ex/missing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_page_keys_is_scoped_to_site() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        store_page(&store, "a", &RawPage::new("https://a.com/x", "")).await.unwrap();
        store_page(&store, "b", &RawPage::new("https://b.com/y", "")).await.unwrap();
        store.put("pages/a/notes.txt", b"ignored".to_vec()).await.unwrap();

        assert_eq!(list_page_keys(&store, "a").await.unwrap(), vec!["pages/a/a.com-x.json"]);
    }
}
