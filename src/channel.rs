use std::rc::Rc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::StreamExt;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{MessageEvent, Worker};

use crate::error::{js_err, FiddleError};
use crate::message::{WorkerMessage, WorkerRequest};
use crate::session::{FiddleSession, Transport};

/// The page's one connection to the pikchr worker. Inbound messages are
/// decoded in the `onmessage` callback and queued on a stream; see [`pump`].
pub struct WorkerChannel {
    worker: Worker,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
}

impl WorkerChannel {
    pub fn spawn(url: &str) -> Result<(Self, UnboundedReceiver<WorkerMessage>), FiddleError> {
        let worker = Worker::new(url).map_err(|err| FiddleError::WorkerSpawn {
            url: url.to_string(),
            message: js_err(err),
        })?;
        let (sender, receiver) = unbounded();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match serde_wasm_bindgen::from_value::<WorkerMessage>(event.data()) {
                Ok(message) => {
                    let _ = sender.unbounded_send(message);
                }
                Err(err) => tracing::warn!(error = %err, "unhandled worker message"),
            }
        });
        worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        tracing::debug!(url, "worker started");
        Ok((
            Self {
                worker,
                _onmessage: onmessage,
            },
            receiver,
        ))
    }
}

impl Transport for WorkerChannel {
    fn post(&self, request: &WorkerRequest) {
        let value = match serde_wasm_bindgen::to_value(request) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "cannot encode worker request");
                return;
            }
        };
        if let Err(err) = self.worker.post_message(&value) {
            tracing::warn!(error = %js_err(err), "postMessage to worker failed");
        }
    }
}

/// Feeds queued worker messages to `session` in arrival order, for as long
/// as the channel lives.
pub fn pump(mut messages: UnboundedReceiver<WorkerMessage>, session: Rc<FiddleSession>) {
    spawn_local(async move {
        while let Some(message) = messages.next().await {
            session.receive(&message);
        }
    });
}
