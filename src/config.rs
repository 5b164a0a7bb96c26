/// Startup configuration. Persisted user flags live in
/// [`crate::settings::Settings`] instead.
#[derive(Clone, Debug, PartialEq)]
pub struct FiddleConfig {
    pub worker_url: String,
    /// Namespace for persisted keys: a project id when one is configured,
    /// else the page path.
    pub storage_namespace: String,
    pub settings_key: String,
    /// Added to the SVG viewBox size when sizing the output container.
    pub svg_margin_px: f64,
    pub resize_debounce_ms: u32,
    pub min_view_height_px: f64,
}

impl Default for FiddleConfig {
    fn default() -> Self {
        Self {
            worker_url: "fiddle-worker.js".to_string(),
            storage_namespace: "/".to_string(),
            settings_key: "config".to_string(),
            svg_margin_px: 10.0,
            resize_debounce_ms: 250,
            min_view_height_px: 100.0,
        }
    }
}

impl FiddleConfig {
    /// Builds the config for a page at `path` with query string `search`.
    /// Recognized query parameters: `worker=<url>` and `project=<id>`.
    pub fn from_location(path: &str, search: &str) -> Self {
        let mut config = Self::default();
        if !path.is_empty() {
            config.storage_namespace = path.to_string();
        }
        for (name, value) in query_pairs(search) {
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "worker" => config.worker_url = value,
                "project" => config.storage_namespace = value,
                _ => {}
            }
        }
        config
    }

    pub fn from_window() -> Self {
        let Some(location) = web_sys::window().map(|window| window.location()) else {
            return Self::default();
        };
        let path = location.pathname().unwrap_or_default();
        let search = location.search().unwrap_or_default();
        Self::from_location(&path, &search)
    }
}

#[cfg(target_arch = "wasm32")]
fn query_pairs(search: &str) -> Vec<(String, String)> {
    let Ok(params) = web_sys::UrlSearchParams::new_with_str(search) else {
        return Vec::new();
    };
    ["worker", "project"]
        .into_iter()
        .filter_map(|name| params.get(name).map(|value| (name.to_string(), value)))
        .collect()
}

/// Plain `a=b&c=d` split; no percent-decoding.
#[cfg(not(target_arch = "wasm32"))]
fn query_pairs(search: &str) -> Vec<(String, String)> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_defaults_to_page_path() {
        let config = FiddleConfig::from_location("/pikchr/fiddle.html", "");
        assert_eq!(config.storage_namespace, "/pikchr/fiddle.html");
        assert_eq!(config.worker_url, "fiddle-worker.js");
        assert_eq!(config.svg_margin_px, 10.0);
    }

    #[test]
    fn query_overrides() {
        let config =
            FiddleConfig::from_location("/fiddle", "?worker=w2.js&project=pikchr&x=1");
        assert_eq!(config.worker_url, "w2.js");
        assert_eq!(config.storage_namespace, "pikchr");
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let config = FiddleConfig::from_location("", "?worker=&project");
        assert_eq!(config, FiddleConfig::default());
    }
}
