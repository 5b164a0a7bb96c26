use serde::{Deserialize, Serialize};

/// Requests posted to the pikchr worker. Serialized as `{type, data}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum WorkerRequest {
    #[serde(rename = "pikchr")]
    Pikchr(String),
}

/// Messages the worker posts back to the page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum WorkerMessage {
    #[serde(rename = "stdout")]
    Stdout(String),
    #[serde(rename = "stderr")]
    Stderr(String),
    #[serde(rename = "module")]
    Module(ModuleEvent),
    #[serde(rename = "fiddle-ready")]
    FiddleReady,
    #[serde(rename = "working")]
    Working(WorkingPhase),
    #[serde(rename = "pikchr")]
    Pikchr(RenderResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Stdout,
    Stderr,
    Module,
    FiddleReady,
    Working,
    Pikchr,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::Stdout,
        MessageKind::Stderr,
        MessageKind::Module,
        MessageKind::FiddleReady,
        MessageKind::Working,
        MessageKind::Pikchr,
    ];

    /// Name used for this kind on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Stdout => "stdout",
            MessageKind::Stderr => "stderr",
            MessageKind::Module => "module",
            MessageKind::FiddleReady => "fiddle-ready",
            MessageKind::Working => "working",
            MessageKind::Pikchr => "pikchr",
        }
    }
}

impl WorkerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            WorkerMessage::Stdout(_) => MessageKind::Stdout,
            WorkerMessage::Stderr(_) => MessageKind::Stderr,
            WorkerMessage::Module(_) => MessageKind::Module,
            WorkerMessage::FiddleReady => MessageKind::FiddleReady,
            WorkerMessage::Working(_) => MessageKind::Working,
            WorkerMessage::Pikchr(_) => MessageKind::Pikchr,
        }
    }
}

/// Load-progress notification from the worker's wasm module. Only
/// `kind == "status"` carries meaning.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModuleEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<ModuleStatus>,
}

impl ModuleEvent {
    pub fn status(&self) -> Option<&ModuleStatus> {
        if self.kind == "status" {
            self.data.as_ref()
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ModuleStatus {
    #[serde(default)]
    pub step: u32,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkingPhase {
    Start,
    End,
    #[serde(other)]
    Other,
}

/// Result of one render. `pikchr` echoes the submitted source so the output
/// can be re-rendered in another mode without keeping the input around.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub pikchr: String,
}
