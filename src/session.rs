use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::FiddleConfig;
use crate::message::{MessageKind, ModuleEvent, RenderResult, WorkerMessage, WorkerRequest, WorkingPhase};
use crate::registry::HandlerRegistry;
use crate::render::{output_size, OutputSize, RenderLifecycle, RenderMode, RenderPhase};
use crate::settings::{SettingFlag, Settings, SettingsStore};

/// Outbound side of the worker connection.
pub trait Transport {
    fn post(&self, request: &WorkerRequest);
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedOutput {
    pub content: String,
    pub is_error: bool,
    /// Source echoed back by the worker, re-rendered on mode changes.
    pub source: String,
    pub mode: RenderMode,
    pub size: Option<OutputSize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModuleProgress {
    pub step: u32,
    pub text: Option<String>,
    pub progress_visible: bool,
    pub finished: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub ready: bool,
    pub lifecycle: RenderLifecycle,
    pub mode: RenderMode,
    pub output: Option<RenderedOutput>,
    pub module: ModuleProgress,
    pub settings: Settings,
    /// Set when settings will not survive a reload.
    pub storage_note: Option<String>,
}

impl ViewState {
    pub fn render_enabled(&self) -> bool {
        self.lifecycle.control_enabled
    }

    pub fn phase(&self) -> RenderPhase {
        self.lifecycle.phase
    }
}

type Listener = Rc<dyn Fn(&ViewState)>;

/// Main-thread controller: owns the handler registry, reacts to worker
/// messages and user actions, and publishes [`ViewState`] snapshots.
pub struct FiddleSession {
    registry: HandlerRegistry,
    transport: Rc<dyn Transport>,
    settings_store: SettingsStore,
    config: FiddleConfig,
    state: RefCell<ViewState>,
    listeners: RefCell<Vec<Listener>>,
    ready_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl FiddleSession {
    pub fn new(
        transport: Rc<dyn Transport>,
        settings_store: SettingsStore,
        config: FiddleConfig,
    ) -> Rc<Self> {
        let settings = settings_store.load();
        let storage_note = settings_store
            .kv()
            .is_transient()
            .then(|| settings_store.kv().storage_description().to_string());
        let session = Rc::new(Self {
            registry: HandlerRegistry::new(),
            transport,
            settings_store,
            config,
            state: RefCell::new(ViewState {
                ready: false,
                lifecycle: RenderLifecycle::default(),
                mode: RenderMode::default(),
                output: None,
                module: ModuleProgress::default(),
                settings,
                storage_note,
            }),
            listeners: RefCell::new(Vec::new()),
            ready_callbacks: RefCell::new(Vec::new()),
        });
        Self::register_handlers(&session);
        session
    }

    fn register_handlers(session: &Rc<Self>) {
        let registry = &session.registry;

        registry.register_fn(MessageKind::Stdout, |msg| {
            if let WorkerMessage::Stdout(text) = msg {
                tracing::info!(target: "worker", "{text}");
            }
        });
        registry.register_fn(MessageKind::Stderr, |msg| {
            if let WorkerMessage::Stderr(text) = msg {
                tracing::error!(target: "worker", "{text}");
            }
        });

        let weak = Rc::downgrade(session);
        registry.register_fn(MessageKind::Module, move |msg| {
            if let (Some(session), WorkerMessage::Module(event)) = (weak.upgrade(), msg) {
                session.on_module(event);
            }
        });

        let weak = Rc::downgrade(session);
        registry.register_fn(MessageKind::FiddleReady, move |_| {
            if let Some(session) = weak.upgrade() {
                session.registry.clear(MessageKind::FiddleReady);
                session.on_ready();
            }
        });

        let weak = Rc::downgrade(session);
        registry.register_fn(MessageKind::Working, move |msg| {
            if let (Some(session), WorkerMessage::Working(phase)) = (weak.upgrade(), msg) {
                session.on_working(*phase);
            }
        });

        let weak: Weak<Self> = Rc::downgrade(session);
        registry.register_fn(MessageKind::Pikchr, move |msg| {
            if let (Some(session), WorkerMessage::Pikchr(result)) = (weak.upgrade(), msg) {
                session.on_render_result(result);
            }
        });
    }

    pub fn config(&self) -> &FiddleConfig {
        &self.config
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// `listener` runs after every state change.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&ViewState) + 'static,
    {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Runs `callback` once, when the worker reports it is ready. Runs
    /// immediately if it already has.
    pub fn when_ready<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        if self.state.borrow().ready {
            callback();
        } else {
            self.ready_callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// Dispatches one inbound message. `false` when no handler took it.
    pub fn receive(&self, message: &WorkerMessage) -> bool {
        self.registry.dispatch(message)
    }

    /// Renders the selection of `value`, or all of it. Blank input is
    /// ignored, as is any submission while the render control is disabled.
    pub fn submit(&self, value: &str, selection_start: u32, selection_end: u32) -> bool {
        if !self.state.borrow().render_enabled() {
            tracing::debug!("render already in progress; submission ignored");
            return false;
        }
        match crate::render::selected_source(value, selection_start, selection_end) {
            Some(text) => {
                self.render(text);
                true
            }
            None => false,
        }
    }

    pub fn render(&self, text: String) {
        self.update(|state| state.lifecycle.begin());
        tracing::debug!(bytes = text.len(), "render requested");
        self.transport.post(&WorkerRequest::Pikchr(text));
    }

    pub fn toggle_render_mode(&self) {
        self.update(|state| state.mode = state.mode.next());
        if let Some(source) = self.cached_source() {
            self.render(source);
        }
    }

    pub fn set_flag(&self, flag: SettingFlag, value: bool) {
        let settings = self.update(|state| {
            state.settings.set_flag(flag, value);
            state.settings.clone()
        });
        if let Err(err) = self.settings_store.save(&settings) {
            tracing::warn!(error = %err, "failed to persist settings");
        }
        if flag == SettingFlag::RenderAutoScale && self.state.borrow().mode == RenderMode::Html {
            if let Some(source) = self.cached_source() {
                self.render(source);
            }
        }
    }

    fn cached_source(&self) -> Option<String> {
        self.state
            .borrow()
            .output
            .as_ref()
            .map(|output| output.source.clone())
            .filter(|source| !source.is_empty())
    }

    fn on_ready(&self) {
        self.update(|state| state.ready = true);
        let callbacks = std::mem::take(&mut *self.ready_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    fn on_module(&self, event: &ModuleEvent) {
        let Some(status) = event.status() else {
            tracing::warn!(kind = event.kind.as_str(), "unexpected module-type message");
            return;
        };
        self.update(|state| {
            let module = &mut state.module;
            module.step = status.step;
            if status.step == 1 {
                module.progress_visible = true;
            }
            match status.text.as_deref().filter(|text| !text.is_empty()) {
                Some(text) => module.text = Some(text.to_string()),
                None => {
                    // Later messages may still report fatal module errors,
                    // so the status line stays wired up.
                    module.progress_visible = false;
                    module.finished = true;
                    module.text = None;
                }
            }
        });
    }

    fn on_working(&self, phase: WorkingPhase) {
        match phase {
            WorkingPhase::Start => {}
            WorkingPhase::End => self.update(|state| state.lifecycle.work_finished()),
            WorkingPhase::Other => tracing::warn!("unhandled 'working' event"),
        }
    }

    fn on_render_result(&self, result: &RenderResult) {
        let margin = self.config.svg_margin_px;
        let echo = self.update(|state| {
            let size = output_size(
                &result.result,
                result.is_error,
                state.mode,
                state.settings.render_auto_scale,
                margin,
            );
            state.lifecycle.complete(result.is_error);
            state.output = Some(RenderedOutput {
                content: result.result.clone(),
                is_error: result.is_error,
                source: result.pikchr.clone(),
                mode: state.mode,
                size,
            });
            state.settings.echo_to_console
        });
        if echo {
            tracing::info!(is_error = result.is_error, "{}", result.result);
        }
    }

    fn update<R>(&self, change: impl FnOnce(&mut ViewState) -> R) -> R {
        let (out, snapshot) = {
            let mut state = self.state.borrow_mut();
            let out = change(&mut *state);
            (out, state.clone())
        };
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&snapshot);
        }
        out
    }
}
