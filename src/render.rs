use regex::Regex;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Output shown verbatim in a scrollable text area.
    Text,
    /// Output embedded as markup.
    #[default]
    Html,
}

impl RenderMode {
    pub fn next(self) -> Self {
        match self {
            RenderMode::Text => RenderMode::Html,
            RenderMode::Html => RenderMode::Text,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Text => "text",
            RenderMode::Html => "html",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Idle,
    Requested,
    Succeeded,
    Failed,
}

/// Tracks one render request at a time. The render control is re-enabled by
/// the worker's "work finished" notification, not by the result itself,
/// because the two may arrive in either order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderLifecycle {
    pub phase: RenderPhase,
    pub control_enabled: bool,
}

impl Default for RenderLifecycle {
    fn default() -> Self {
        Self {
            phase: RenderPhase::Idle,
            control_enabled: true,
        }
    }
}

impl RenderLifecycle {
    /// Overlapping requests are allowed; a second `begin` simply restarts.
    pub fn begin(&mut self) {
        self.phase = RenderPhase::Requested;
        self.control_enabled = false;
    }

    pub fn complete(&mut self, is_error: bool) {
        self.phase = if is_error {
            RenderPhase::Failed
        } else {
            RenderPhase::Succeeded
        };
    }

    pub fn work_finished(&mut self) {
        self.control_enabled = true;
        if self.phase != RenderPhase::Requested {
            self.phase = RenderPhase::Idle;
        }
    }
}

/// Text to submit for rendering: the selection when one exists, else the
/// whole input, trimmed. Offsets are UTF-16 code units as reported by the
/// DOM. `None` when nothing but whitespace remains.
pub fn selected_source(value: &str, selection_start: u32, selection_end: u32) -> Option<String> {
    let text = if selection_start < selection_end {
        let units: Vec<u16> = value.encode_utf16().collect();
        let end = (selection_end as usize).min(units.len());
        let start = (selection_start as usize).min(end);
        String::from_utf16_lossy(&units[start..end])
    } else {
        value.to_string()
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canned diagrams offered as one-click renders, as `(label, source)`.
pub const PRESETS: &[(&str, &str)] = &[
    ("Box", r#"box "Hello" "Pikchr" fit"#),
    (
        "Flow",
        r#"arrow right "Input" above
box "Process" fit
arrow right "Output" above"#,
    ),
    (
        "Shapes",
        r#"circle "A" fit
arrow
ellipse "B" fit
arrow
cylinder "C" fit"#,
    ),
];

/// Markup for the output container. Text mode shows the raw output inside a
/// read-only text area.
pub fn output_markup(content: &str, mode: RenderMode) -> String {
    match mode {
        RenderMode::Html => content.to_string(),
        RenderMode::Text => {
            let escaped = content
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            format!("<textarea readonly>{escaped}</textarea>")
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputSize {
    pub width: f64,
    pub height: f64,
}

impl OutputSize {
    pub fn css(&self) -> (String, String) {
        (format!("{}px", self.width), format!("{}px", self.height))
    }
}

/// Explicit pixel size for the output container, or `None` to let it size
/// itself.
pub fn output_size(
    result: &str,
    is_error: bool,
    mode: RenderMode,
    auto_scale: bool,
    margin: f64,
) -> Option<OutputSize> {
    if auto_scale || is_error || mode != RenderMode::Html {
        return None;
    }

    static RE_SVG: OnceLock<Regex> = OnceLock::new();
    static RE_VIEWBOX: OnceLock<Regex> = OnceLock::new();
    let re_svg = RE_SVG.get_or_init(|| Regex::new(r"^\s*<svg\b([^>]*)>").unwrap());
    let re_viewbox = RE_VIEWBOX
        .get_or_init(|| Regex::new(r#"\bviewBox\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

    let attrs = re_svg.captures(result)?.get(1)?.as_str();
    let Some(view_box) = re_viewbox
        .captures(attrs)
        .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
    else {
        tracing::warn!("SVG element is missing viewBox attribute");
        return None;
    };

    let parts: Vec<f64> = view_box
        .as_str()
        .split_whitespace()
        .filter_map(|part| part.parse().ok())
        .collect();
    let [_, _, width, height] = parts[..] else {
        tracing::warn!(view_box = view_box.as_str(), "malformed SVG viewBox");
        return None;
    };
    Some(OutputSize {
        width: width + margin,
        height: height + margin,
    })
}
