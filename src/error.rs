use wasm_bindgen::{JsCast, JsValue};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage rejected `{key}`: {message}")]
    Js { key: String, message: String },
    #[error("cannot encode `{key}` as JSON: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FiddleError {
    #[error("browser global `{0}` is unavailable")]
    MissingGlobal(&'static str),
    #[error("failed to start worker `{url}`: {message}")]
    WorkerSpawn { url: String, message: String },
}

/// Best-effort description of a thrown JS value.
pub fn js_err(value: JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
