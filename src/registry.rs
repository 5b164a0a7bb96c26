use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::message::{MessageKind, WorkerMessage};

pub type Handler = Rc<dyn Fn(&WorkerMessage)>;

/// Maps each message kind to an ordered list of handlers.
///
/// Handlers run in registration order. The same handler registered twice runs
/// twice. A handler may register or clear handlers while it is being
/// dispatched; the change takes effect from the next dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RefCell<HashMap<MessageKind, Vec<Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I>(&self, kinds: I, handler: Handler)
    where
        I: IntoIterator<Item = MessageKind>,
    {
        let mut map = self.handlers.borrow_mut();
        for kind in kinds {
            map.entry(kind).or_default().push(handler.clone());
        }
    }

    pub fn register_fn<F>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(&WorkerMessage) + 'static,
    {
        self.register([kind], Rc::new(handler));
    }

    /// Runs every handler registered for `message.kind()`. Returns `false`
    /// when the kind has no handler list.
    pub fn dispatch(&self, message: &WorkerMessage) -> bool {
        let kind = message.kind();
        let list = self.handlers.borrow().get(&kind).cloned();
        let Some(list) = list else {
            tracing::warn!(kind = kind.as_str(), "no handlers found for message type");
            return false;
        };
        for handler in list {
            handler(message);
        }
        true
    }

    pub fn clear(&self, kind: MessageKind) {
        self.handlers.borrow_mut().remove(&kind);
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.handlers
            .borrow()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WorkingPhase;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |label: &'static str| -> Handler {
            let sink = sink.clone();
            Rc::new(move |msg: &WorkerMessage| {
                sink.borrow_mut()
                    .push(format!("{label}:{}", msg.kind().as_str()));
            })
        };
        (log, make)
    }

    #[test]
    fn runs_handlers_in_registration_order() {
        let registry = HandlerRegistry::new();
        let (log, make) = recorder();
        registry.register([MessageKind::Stdout], make("a"));
        registry.register([MessageKind::Stdout], make("b"));
        registry.register([MessageKind::Stdout], make("c"));

        assert!(registry.dispatch(&WorkerMessage::Stdout("hi".into())));
        assert_eq!(*log.borrow(), vec!["a:stdout", "b:stdout", "c:stdout"]);
    }

    #[test]
    fn duplicate_registration_runs_twice() {
        let registry = HandlerRegistry::new();
        let (log, make) = recorder();
        let handler = make("dup");
        registry.register([MessageKind::Stderr], handler.clone());
        registry.register([MessageKind::Stderr], handler);

        registry.dispatch(&WorkerMessage::Stderr("oops".into()));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn one_handler_for_several_kinds() {
        let registry = HandlerRegistry::new();
        let (log, make) = recorder();
        registry.register([MessageKind::Stdout, MessageKind::Stderr], make("io"));

        registry.dispatch(&WorkerMessage::Stdout("a".into()));
        registry.dispatch(&WorkerMessage::Stderr("b".into()));
        assert_eq!(*log.borrow(), vec!["io:stdout", "io:stderr"]);
    }

    #[test]
    fn unregistered_kind_is_unhandled() {
        let registry = HandlerRegistry::new();
        assert!(!registry.dispatch(&WorkerMessage::FiddleReady));
    }

    #[test]
    fn cleared_kind_behaves_as_never_registered() {
        let registry = HandlerRegistry::new();
        let (log, make) = recorder();
        registry.register([MessageKind::Working], make("w"));
        registry.clear(MessageKind::Working);

        assert_eq!(registry.handler_count(MessageKind::Working), 0);
        assert!(!registry.dispatch(&WorkerMessage::Working(WorkingPhase::End)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn one_shot_handler_can_clear_itself() {
        let registry = Rc::new(HandlerRegistry::new());
        let fired = Rc::new(RefCell::new(0));
        let weak = Rc::downgrade(&registry);
        let counter = fired.clone();
        registry.register_fn(MessageKind::FiddleReady, move |_| {
            if let Some(registry) = weak.upgrade() {
                registry.clear(MessageKind::FiddleReady);
            }
            *counter.borrow_mut() += 1;
        });

        assert!(registry.dispatch(&WorkerMessage::FiddleReady));
        assert!(!registry.dispatch(&WorkerMessage::FiddleReady));
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    #[should_panic(expected = "handler failed")]
    fn handler_panics_propagate() {
        let registry = HandlerRegistry::new();
        registry.register_fn(MessageKind::Stdout, |_| panic!("handler failed"));
        registry.dispatch(&WorkerMessage::Stdout(String::new()));
    }
}
