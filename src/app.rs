use std::rc::Rc;

use gloo::events::EventListener;
use leptos::prelude::*;

use crate::channel::{self, WorkerChannel};
use crate::config::FiddleConfig;
use crate::debounce::Debouncer;
use crate::error::FiddleError;
use crate::layout::{app_view_height, effective_height};
use crate::render::{output_markup, RenderMode, PRESETS};
use crate::session::FiddleSession;
use crate::settings::{SettingFlag, SettingsStore};
use crate::storage::KvStore;

const DEFAULT_SOURCE: &str = r#"arrow right 200% "Markdown" "Source"
box rad 10px "Markdown" "Formatter" "(markdown.c)" fit
arrow right 200% "HTML+SVG" "Output"
arrow <-> down 70% from last box.s
box same "Pikchr" "Formatter" "(pikchr.c)" fit"#;

/// Application context, built once at startup and handed to the root view.
#[derive(Clone)]
pub struct Fiddle {
    session: Rc<FiddleSession>,
}

impl Fiddle {
    pub fn start(config: FiddleConfig) -> Result<Self, FiddleError> {
        web_sys::window().ok_or(FiddleError::MissingGlobal("window"))?;
        let kv = KvStore::detect(&config.storage_namespace);
        tracing::info!(
            storage = kv.storage_name(),
            namespace = config.storage_namespace.as_str(),
            "settings storage selected"
        );
        let settings_store = SettingsStore::new(kv, &config.settings_key);
        let (worker, messages) = WorkerChannel::spawn(&config.worker_url)?;
        let session = FiddleSession::new(Rc::new(worker), settings_store, config);
        channel::pump(messages, session.clone());
        Ok(Self { session })
    }

    pub fn session(&self) -> &Rc<FiddleSession> {
        &self.session
    }
}

fn recompute_view_height(view_height: RwSignal<Option<String>>, min_height: f64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let window_height = window
        .inner_height()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0);
    let chrome: f64 = ["#fiddle-header", "#fiddle-footer"]
        .into_iter()
        .map(|selector| effective_height(document.query_selector(selector).ok().flatten().as_ref()))
        .sum();
    view_height.set(Some(app_view_height(window_height, chrome, min_height)));
}

#[component]
pub fn App(fiddle: Fiddle) -> impl IntoView {
    let session = fiddle.session().clone();
    let view_state = RwSignal::new(session.state());
    session.subscribe(move |state| view_state.set(state.clone()));

    let input_ref = NodeRef::<leptos::html::Textarea>::new();
    let view_height = RwSignal::new(None::<String>);
    let (options_collapsed, set_options_collapsed) = signal(false);

    let submit: Rc<dyn Fn()> = {
        let session = session.clone();
        Rc::new(move || {
            let Some(input) = input_ref.get_untracked() else {
                return;
            };
            let start = input.selection_start().ok().flatten().unwrap_or(0);
            let end = input.selection_end().ok().flatten().unwrap_or(0);
            session.submit(&input.value(), start, end);
        })
    };

    {
        let submit = submit.clone();
        let min_height = session.config().min_view_height_px;
        let resize_delay = session.config().resize_debounce_ms;
        session.when_ready(move || {
            recompute_view_height(view_height, min_height);
            let debouncer = Debouncer::new(resize_delay, move || {
                recompute_view_height(view_height, min_height);
            });
            if let Some(window) = web_sys::window() {
                EventListener::new(&window, "resize", move |_| debouncer.trigger()).forget();
            }
            submit();
        });
    }

    let markup = Memo::new(move |_| {
        view_state.with(|state| {
            state
                .output
                .as_ref()
                .map(|output| output_markup(&output.content, output.mode))
                .unwrap_or_default()
        })
    });

    let output_class = move || {
        view_state.with(|state| match &state.output {
            Some(output) => {
                let mut class = String::from("pikchr-output");
                if output.is_error {
                    class.push_str(" error");
                }
                if output.mode == RenderMode::Text {
                    class.push_str(" text");
                }
                class
            }
            None => String::from("pikchr-output"),
        })
    };

    let output_style = move || {
        view_state.with(|state| {
            match state.output.as_ref().and_then(|output| output.size) {
                Some(size) => {
                    let (width, height) = size.css();
                    format!("width: {width}; height: {height};")
                }
                None => String::new(),
            }
        })
    };

    let view_class = move || {
        view_state.with(|state| {
            let mut class = String::from("app-view");
            if !state.ready {
                class.push_str(" initially-hidden");
            }
            class
        })
    };

    let view_style = move || {
        view_height
            .get()
            .map(|height| format!("height: {height}; max-height: {height};"))
            .unwrap_or_default()
    };

    let main_class = move || {
        view_state.with(|state| {
            let mut class = String::from("main-view");
            if state.settings.side_by_side {
                class.push_str(" side-by-side");
            }
            if state.settings.swap_in_out {
                class.push_str(" swapio");
            }
            class
        })
    };

    let options = SettingFlag::ALL
        .into_iter()
        .map(|flag| {
            let session = session.clone();
            view! {
                <label class="option">
                    <input
                        type="checkbox"
                        prop:checked=move || view_state.with(|state| state.settings.flag(flag))
                        on:change=move |ev| session.set_flag(flag, event_target_checked(&ev))
                    />
                    {flag.label()}
                </label>
            }
        })
        .collect::<Vec<_>>();

    let presets = PRESETS
        .iter()
        .map(|&(label, source)| {
            let session = session.clone();
            view! {
                <button
                    class="preset"
                    prop:disabled=move || !view_state.with(|state| state.render_enabled())
                    on:click=move |_| session.render(source.to_string())
                >
                    {label}
                </button>
            }
        })
        .collect::<Vec<_>>();

    let on_keydown = {
        let submit = submit.clone();
        move |ev: leptos::ev::KeyboardEvent| {
            if (ev.ctrl_key() || ev.shift_key()) && ev.key() == "Enter" {
                ev.prevent_default();
                ev.stop_propagation();
                submit();
            }
        }
    };

    let on_render = {
        let submit = submit.clone();
        move |ev: leptos::ev::MouseEvent| {
            ev.prevent_default();
            submit();
        }
    };

    let on_toggle_mode = {
        let session = session.clone();
        move |_: leptos::ev::MouseEvent| session.toggle_render_mode()
    };

    let status_class = move || {
        view_state.with(|state| if state.module.text.is_some() { "" } else { "hidden" })
    };
    let progress_class = move || {
        view_state.with(|state| if state.module.progress_visible { "" } else { "hidden" })
    };
    let spinner_class = move || {
        view_state.with(|state| {
            if state.module.progress_visible {
                "spinner"
            } else {
                "spinner hidden"
            }
        })
    };
    let fieldset_class = move || {
        if options_collapsed.get() {
            "options collapsible collapsed"
        } else {
            "options collapsible"
        }
    };
    let options_body_class = move || if options_collapsed.get() { "hidden" } else { "" };
    let wrapper_class = move || {
        view_state.with(|state| if state.mode == RenderMode::Text { "text" } else { "" })
    };

    view! {
        <header id="fiddle-header">
            <span class="title">"Pikchr Fiddle"</span>
            <span id="module-status" class=status_class>
                {move || view_state.with(|state| state.module.text.clone())}
            </span>
            <progress
                id="module-progress"
                class=progress_class
                prop:value=move || view_state.with(|state| state.module.step as f64)
                prop:max=move || view_state.with(|state| state.module.step as f64 + 1.0)
            ></progress>
            <div id="module-spinner" class=spinner_class></div>
        </header>
        <main class=main_class>
            <fieldset class=fieldset_class>
                <span class="legend" on:click=move |_| set_options_collapsed.update(|collapsed| *collapsed = !*collapsed)>
                    "Options"
                </span>
                <div class=options_body_class>
                    {options}
                </div>
            </fieldset>
            <div class=view_class style=view_style>
                <div class="input-area">
                    <textarea
                        id="input"
                        node_ref=input_ref
                        placeholder="Pikchr input. Ctrl-enter/shift-enter runs it."
                        spellcheck="false"
                        on:keydown=on_keydown
                    >
                        {DEFAULT_SOURCE}
                    </textarea>
                    <div class="button-bar">
                        <button
                            id="btn-render"
                            prop:disabled=move || !view_state.with(|state| state.render_enabled())
                            on:click=on_render
                        >
                            "Render"
                        </button>
                        <button
                            id="btn-clear"
                            on:click=move |_| {
                                if let Some(input) = input_ref.get_untracked() {
                                    input.set_value("");
                                }
                            }
                        >
                            "Clear Input"
                        </button>
                        <button id="btn-render-mode" on:click=on_toggle_mode>
                            {move || format!("Render mode: {}", view_state.with(|state| state.mode.label()))}
                        </button>
                    </div>
                    <div class="button-bar presets">
                        {presets}
                    </div>
                </div>
                <div id="pikchr-output-wrapper" class=wrapper_class>
                    <div id="pikchr-output" class=output_class style=output_style inner_html=move || markup.get()></div>
                </div>
            </div>
        </main>
        <footer id="fiddle-footer">
            {move || view_state.with(|state| state.storage_note.clone())}
        </footer>
    }
}
