//! Ordered subscriber registry.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::dispatch::{CallbackResult, ChannelKey, Handle};
use crate::message::Message;
use crate::observability::metrics;

type BoxedCallback = Box<dyn Fn(&Handle, &Message) -> CallbackResult + Send + Sync>;

/// One registered callback with its bound parameters captured inside.
struct Subscriber {
    key: ChannelKey,
    order: usize,
    callback: BoxedCallback,
}

/// Result of dispatching one message.
#[derive(Debug)]
pub struct Dispatched {
    /// Message to emit: the last replacement, or the original.
    pub message: Message,
    /// Number of callbacks that ran.
    pub invoked: usize,
    /// Whether any callback returned a replacement.
    pub replaced: bool,
    /// Callbacks that returned an error or panicked.
    pub failures: usize,
}

/// Channel key → subscribers, in registration order.
#[derive(Default)]
pub struct Registry {
    channels: HashMap<ChannelKey, Vec<Subscriber>>,
    registered: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to `key`.
    ///
    /// `params` is captured now and handed to every invocation. Callbacks on
    /// the same key run in the order they were registered.
    pub fn on<P, F>(&mut self, key: ChannelKey, params: P, callback: F) -> &mut Self
    where
        P: Send + Sync + 'static,
        F: Fn(&Handle, &Message, &P) -> CallbackResult + Send + Sync + 'static,
    {
        let order = self.registered;
        self.registered += 1;

        tracing::debug!(channel = %key, order, "Subscriber registered");
        self.channels.entry(key.clone()).or_default().push(Subscriber {
            key,
            order,
            callback: Box::new(move |handle, message| callback(handle, message, &params)),
        });
        self
    }

    /// Total number of subscribers.
    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Number of distinct channel keys with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Run every subscriber of `message` and fold their results.
    ///
    /// Subscribers of `message`, then of the message's category, then of
    /// `category#id` are invoked, each group in registration order. Every
    /// callback sees the original message. The last replacement returned
    /// overwrites any earlier one.
    pub fn dispatch(&self, handle: &Handle, message: Message) -> Dispatched {
        let mut replacement = None;
        let mut invoked = 0;
        let mut failures = 0;

        for key in ChannelKey::for_message(&message) {
            let Some(subscribers) = self.channels.get(&key) else {
                continue;
            };

            for subscriber in subscribers {
                invoked += 1;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    (subscriber.callback)(handle, &message)
                }));

                match outcome {
                    Ok(Ok(Some(new_message))) => replacement = Some(new_message),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        failures += 1;
                        metrics::record_callback_failure();
                        tracing::warn!(
                            channel = %subscriber.key,
                            order = subscriber.order,
                            id = %message.id(),
                            error = %e,
                            "Callback failed"
                        );
                    }
                    Err(_) => {
                        failures += 1;
                        metrics::record_callback_failure();
                        tracing::error!(
                            channel = %subscriber.key,
                            order = subscriber.order,
                            id = %message.id(),
                            "Callback panicked"
                        );
                    }
                }
            }
        }

        let replaced = replacement.is_some();
        Dispatched {
            message: replacement.unwrap_or(message),
            invoked,
            replaced,
            failures,
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut channels: Vec<(String, usize)> = self
            .channels
            .iter()
            .map(|(key, subs)| (key.to_string(), subs.len()))
            .collect();
        channels.sort();
        f.debug_struct("Registry")
            .field("channels", &channels)
            .field("registered", &self.registered)
            .finish()
    }
}
