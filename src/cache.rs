use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Response-level cache for list pages: key is the route plus its
/// canonicalized query string, value is the serialized body. Entries live for
/// a fixed interval; `clear` is the explicit invalidation hook exposed to
/// administrative and test tooling.
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    body: String,
    stored_at: Instant,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        PageCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(path: &str, page: Option<&str>) -> String {
        match page {
            Some(page) => format!("{}?page={}", path, page),
            None => path.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("page cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, body: String) {
        let mut entries = self.entries.lock().expect("page cache poisoned");
        entries.insert(
            key,
            Entry {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("page cache poisoned");
        entries.clear();
        log::info!("page cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_entry_within_ttl() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.put("/".into(), "body".into());
        assert_eq!(cache.get("/"), Some("body".into()));
    }

    #[test]
    fn expires_entry_after_ttl() {
        let cache = PageCache::new(Duration::from_millis(5));
        cache.put("/".into(), "body".into());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("/"), None);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.put(PageCache::key("/", None), "first".into());
        cache.put(PageCache::key("/", Some("2")), "second".into());
        cache.clear();
        assert_eq!(cache.get("/"), None);
        assert_eq!(cache.get("/?page=2"), None);
    }

    #[test]
    fn key_includes_page_parameter() {
        assert_eq!(PageCache::key("/", None), "/");
        assert_eq!(PageCache::key("/", Some("3")), "/?page=3");
    }
}
