use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::timers::callback::Timeout;

pub const DEFAULT_DELAY_MS: u32 = 500;

/// Coalesces bursts of calls into one call after `delay_ms` of quiet.
///
/// In immediate mode the callback runs on the leading edge instead, and
/// further triggers are swallowed until the quiet period has passed.
#[derive(Clone)]
pub struct Debouncer {
    delay_ms: u32,
    immediate: bool,
    callback: Rc<dyn Fn()>,
    armed: Rc<Cell<bool>>,
    pending: Rc<RefCell<Option<Timeout>>>,
}

impl Debouncer {
    /// A zero delay means [`DEFAULT_DELAY_MS`].
    pub fn new<F>(delay_ms: u32, callback: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            delay_ms: if delay_ms == 0 { DEFAULT_DELAY_MS } else { delay_ms },
            immediate: false,
            callback: Rc::new(callback),
            armed: Rc::new(Cell::new(false)),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn trigger(&self) {
        let call_now = self.immediate && !self.armed.get();
        let armed = self.armed.clone();
        let callback = self.callback.clone();
        let trailing = !self.immediate;
        let timer = Timeout::new(self.delay_ms, move || {
            armed.set(false);
            if trailing {
                callback();
            }
        });
        self.armed.set(true);
        // Replacing the previous timeout cancels it.
        *self.pending.borrow_mut() = Some(timer);
        if call_now {
            (self.callback)();
        }
    }
}
