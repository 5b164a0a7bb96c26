use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{js_err, StorageError};

const PROBE_KEY: &str = "__pikchr_fiddle_probe__";

/// A flat string key/value store.
pub trait KvBackend {
    fn name(&self) -> &'static str;
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str);
    fn keys(&self) -> Vec<String>;

    /// True when values do not outlive the page.
    fn is_transient(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebStorageKind {
    Local,
    Session,
}

/// `localStorage` or `sessionStorage`.
pub struct WebStorage {
    storage: web_sys::Storage,
    kind: WebStorageKind,
}

impl WebStorage {
    pub fn open(kind: WebStorageKind) -> Option<Self> {
        let window = web_sys::window()?;
        let storage = match kind {
            WebStorageKind::Local => window.local_storage(),
            WebStorageKind::Session => window.session_storage(),
        };
        let storage = storage.ok()??;
        Some(Self { storage, kind })
    }
}

impl KvBackend for WebStorage {
    fn name(&self) -> &'static str {
        match self.kind {
            WebStorageKind::Local => "localStorage",
            WebStorageKind::Session => "sessionStorage",
        }
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| StorageError::Js {
                key: key.to_string(),
                message: js_err(err),
            })
    }

    fn remove_item(&self, key: &str) {
        let _ = self.storage.remove_item(key);
    }

    fn keys(&self) -> Vec<String> {
        let len = self.storage.length().unwrap_or(0);
        (0..len)
            .filter_map(|i| self.storage.key(i).ok().flatten())
            .collect()
    }
}

/// In-memory fallback. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    fn is_transient(&self) -> bool {
        true
    }
}

/// Write/read/delete round trip on a throwaway key.
fn passes_self_test(backend: &dyn KvBackend) -> bool {
    if backend.set_item(PROBE_KEY, PROBE_KEY).is_err() {
        return false;
    }
    let read_back = backend.get_item(PROBE_KEY);
    backend.remove_item(PROBE_KEY);
    read_back.as_deref() == Some(PROBE_KEY) && backend.get_item(PROBE_KEY).is_none()
}

/// First candidate that passes the self-test, else a [`MemoryStorage`].
/// Candidates after the winner are never opened.
pub fn select_backend<I>(candidates: I) -> Box<dyn KvBackend>
where
    I: IntoIterator<Item = Box<dyn KvBackend>>,
{
    for candidate in candidates {
        if passes_self_test(candidate.as_ref()) {
            tracing::debug!(backend = candidate.name(), "storage backend selected");
            return candidate;
        }
        tracing::warn!(backend = candidate.name(), "storage self-test failed");
    }
    Box::new(MemoryStorage::new())
}

/// Namespaced view over a [`KvBackend`]. Every key is stored as
/// `<namespace>::<key>` so unrelated pages on the same origin do not collide.
pub struct KvStore {
    backend: Box<dyn KvBackend>,
    prefix: String,
}

impl KvStore {
    pub fn new(backend: Box<dyn KvBackend>, namespace: &str) -> Self {
        Self {
            backend,
            prefix: format!("{namespace}::"),
        }
    }

    /// localStorage, then sessionStorage, then memory.
    pub fn detect(namespace: &str) -> Self {
        let candidates = [WebStorageKind::Local, WebStorageKind::Session]
            .into_iter()
            .filter_map(WebStorage::open)
            .map(|storage| Box::new(storage) as Box<dyn KvBackend>);
        Self::new(select_backend(candidates), namespace)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.backend
            .get_item(&self.full_key(key))
            .unwrap_or_else(|| default.to_string())
    }

    /// `default` when the key is absent or holds anything but `true`/`false`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.backend.get_item(&self.full_key(key)).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.backend.get_item(&self.full_key(key)) else {
            return default;
        };
        serde_json::from_str(&raw).unwrap_or(default)
    }

    pub fn set<V: ToString + ?Sized>(&self, key: &str, value: &V) -> Result<(), StorageError> {
        self.backend
            .set_item(&self.full_key(key), &value.to_string())
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.set_item(&self.full_key(key), &encoded)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.backend.get_item(&self.full_key(key)).is_some()
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove_item(&self.full_key(key));
    }

    /// Keys of this namespace, without the prefix.
    pub fn keys(&self) -> Vec<String> {
        self.backend
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    /// Removes this namespace's keys only.
    pub fn clear(&self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }

    pub fn is_transient(&self) -> bool {
        self.backend.is_transient()
    }

    pub fn storage_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn storage_description(&self) -> &'static str {
        match self.backend.name() {
            "localStorage" => {
                "Browser-local persistent storage with an unspecified long-term \
                 lifetime (survives closing the browser, but maybe not a browser upgrade)."
            }
            "sessionStorage" => "Storage local to this browser tab, lost if this tab is closed.",
            _ => "Transient storage local to this invocation of this page.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct BrokenStorage;

    impl KvBackend for BrokenStorage {
        fn name(&self) -> &'static str {
            "localStorage"
        }
        fn get_item(&self, _key: &str) -> Option<String> {
            None
        }
        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Js {
                key: key.to_string(),
                message: "QuotaExceededError".into(),
            })
        }
        fn remove_item(&self, _key: &str) {}
        fn keys(&self) -> Vec<String> {
            Vec::new()
        }
    }

    /// Accepts writes but never returns them.
    struct ForgetfulStorage;

    impl KvBackend for ForgetfulStorage {
        fn name(&self) -> &'static str {
            "sessionStorage"
        }
        fn get_item(&self, _key: &str) -> Option<String> {
            None
        }
        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Ok(())
        }
        fn remove_item(&self, _key: &str) {}
        fn keys(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn memory_store(namespace: &str) -> KvStore {
        KvStore::new(Box::new(MemoryStorage::new()), namespace)
    }

    #[test]
    fn get_returns_default_until_set() {
        let store = memory_store("/fiddle");
        assert_eq!(store.get("theme", "light"), "light");
        assert!(!store.contains("theme"));

        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme", "light"), "dark");
        store.set("theme", "sepia").unwrap();
        assert_eq!(store.get("theme", "light"), "sepia");
    }

    #[test]
    fn non_string_values_read_back_as_strings() {
        let store = memory_store("/fiddle");
        store.set("count", &42).unwrap();
        assert_eq!(store.get("count", ""), "42");
        store.set("flag", &true).unwrap();
        assert!(store.get_bool("flag", false));
    }

    #[test]
    fn get_bool_defaults_and_decodes() {
        let store = memory_store("/fiddle");
        assert!(store.get_bool("missing", true));
        store.set("off", "false").unwrap();
        assert!(!store.get_bool("off", true));
        store.set("junk", "yes").unwrap();
        assert!(store.get_bool("junk", true));
        assert!(!store.get_bool("junk", false));
    }

    #[test]
    fn json_round_trip() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Layout {
            columns: u32,
            names: Vec<String>,
        }

        let store = memory_store("/fiddle");
        let value = Layout {
            columns: 2,
            names: vec!["input".into(), "output".into()],
        };
        store.set_json("layout", &value).unwrap();
        let read: Layout = store.get_json(
            "layout",
            Layout {
                columns: 0,
                names: Vec::new(),
            },
        );
        assert_eq!(read, value);
    }

    #[test]
    fn get_json_falls_back_on_bad_data() {
        let store = memory_store("/fiddle");
        store.set("nums", "not json").unwrap();
        assert_eq!(store.get_json::<Vec<u32>>("nums", vec![7]), vec![7]);
        assert_eq!(store.get_json::<Vec<u32>>("absent", vec![1]), vec![1]);
    }

    #[test]
    fn namespaces_are_isolated() {
        let shared = MemoryStorage::new();
        let a = KvStore::new(Box::new(shared.clone()), "/a");
        let b = KvStore::new(Box::new(shared.clone()), "/b");
        a.set("k", "from-a").unwrap();
        b.set("k", "from-b").unwrap();
        b.set("other", "x").unwrap();

        assert_eq!(a.get("k", ""), "from-a");
        assert_eq!(a.keys(), vec!["k".to_string()]);

        a.clear();
        assert!(!a.contains("k"));
        assert_eq!(b.get("k", ""), "from-b");
        assert_eq!(shared.keys(), vec!["/b::k".to_string(), "/b::other".to_string()]);
    }

    #[test]
    fn remove_deletes_single_key() {
        let store = memory_store("/fiddle");
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a");
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
    }

    #[test]
    fn falls_back_to_memory_when_every_backend_fails() {
        let candidates: Vec<Box<dyn KvBackend>> =
            vec![Box::new(BrokenStorage), Box::new(ForgetfulStorage)];
        let store = KvStore::new(select_backend(candidates), "/fiddle");

        assert!(store.is_transient());
        assert_eq!(store.storage_name(), "transient");
        assert!(store.storage_description().starts_with("Transient"));
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k", ""), "v");
    }

    #[test]
    fn keeps_first_backend_that_passes() {
        let durable = MemoryStorage::new();
        let candidates: Vec<Box<dyn KvBackend>> =
            vec![Box::new(BrokenStorage), Box::new(durable.clone())];
        let backend = select_backend(candidates);
        backend.set_item("x", "1").unwrap();

        assert_eq!(durable.get_item("x").as_deref(), Some("1"));
        assert!(durable.get_item(PROBE_KEY).is_none());
    }
}
