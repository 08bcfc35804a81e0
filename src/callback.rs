//!
//! This module defines the completion handler of request-reply style calls.
//!
//! Applications implement [`RequestCallback`] and wrap it in a [`Callback`], choosing who owns the
//! handler: the application itself ([`Callback::caller_owned`]) or the client
//! ([`Callback::self_deleting`]), which drops it right after the single invocation.
//!
use crate::error::ClientError;
use crate::message::Message;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Lifetime policy of a callback.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RequestCallbackType {
    /// The application owns the handler and decides when to drop it.
    #[default]
    CallerOwned,

    /// The client drops the handler once it has been invoked.
    SelfDeleting,
}

/// Receives the outcome of an asynchronous request.
///
/// Exactly one of the two methods is called, exactly once, per request.
pub trait RequestCallback: Send {
    /// Called with the reply. The handler takes ownership of the message.
    fn on_success(&mut self, message: Message);

    /// Called when the request failed, e.g. the connection was reset or the request timed out.
    ///
    /// Implementations must not panic. A panic escaping this method is caught and logged.
    fn on_exception(&mut self, error: &ClientError);
}

enum Ownership {
    CallerOwned(Arc<Mutex<dyn RequestCallback>>),
    SelfDeleting(Box<dyn RequestCallback>),
}

/// A single-shot handle to a [`RequestCallback`] under one of the two lifetime policies.
///
/// The `invoke_*` methods consume the handle, so a callback can never fire twice.
pub struct Callback {
    ownership: Ownership,
}

impl Callback {
    /// Share the handler with the client. The application keeps its own `Arc` and may inspect the
    /// handler after it has been invoked.
    pub fn caller_owned<C>(handler: Arc<Mutex<C>>) -> Self
    where
        C: RequestCallback + 'static,
    {
        Self {
            ownership: Ownership::CallerOwned(handler),
        }
    }

    /// Hand the handler over to the client, which drops it right after invocation.
    pub fn self_deleting<C>(handler: C) -> Self
    where
        C: RequestCallback + 'static,
    {
        Self {
            ownership: Ownership::SelfDeleting(Box::new(handler)),
        }
    }

    pub fn callback_type(&self) -> RequestCallbackType {
        match self.ownership {
            Ownership::CallerOwned(_) => RequestCallbackType::CallerOwned,
            Ownership::SelfDeleting(_) => RequestCallbackType::SelfDeleting,
        }
    }

    pub fn invoke_on_success(self, message: Message) {
        debug!(
            "Invoking {:?} callback with reply of topic {}",
            self.callback_type(),
            message.topic
        );
        match self.ownership {
            Ownership::CallerOwned(handler) => {
                lock(&handler).on_success(message);
            }
            Ownership::SelfDeleting(mut handler) => {
                handler.on_success(message);
                drop(handler);
            }
        }
    }

    pub fn invoke_on_exception(self, error: &ClientError) {
        debug!(
            "Invoking {:?} callback with failure: {}",
            self.callback_type(),
            error
        );
        let outcome = match self.ownership {
            Ownership::CallerOwned(handler) => {
                panic::catch_unwind(AssertUnwindSafe(|| {
                    lock(&handler).on_exception(error);
                }))
            }
            Ownership::SelfDeleting(mut handler) => {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| handler.on_exception(error)));
                drop(handler);
                outcome
            }
        };

        if outcome.is_err() {
            error!("Callback panicked while handling failure: {}", error);
        }
    }

    /// Deliver the outcome of a request: a reply goes to `on_success`, a failure to
    /// `on_exception`.
    pub fn invoke(self, result: Result<Message, ClientError>) {
        match result {
            Ok(message) => self.invoke_on_success(message),
            Err(e) => self.invoke_on_exception(&e),
        }
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("type", &self.callback_type())
            .finish()
    }
}

fn lock(handler: &Mutex<dyn RequestCallback>) -> MutexGuard<'_, dyn RequestCallback + 'static> {
    match handler.lock() {
        Ok(guard) => guard,
        Err(e) => {
            warn!("Callback lock is poisoned. Cause: {}", e);
            e.into_inner()
        }
    }
}

/// Closure-backed [`RequestCallback`].
///
/// # Examples
///
/// ```
/// use rocketmq_client_core::callback::{Callback, FnCallback};
/// use rocketmq_client_core::message::Message;
///
/// let callback = Callback::self_deleting(FnCallback::new(
///     |message: Message| println!("reply on {}", message.topic),
///     |e| eprintln!("request failed: {}", e),
/// ));
/// callback.invoke_on_success(Message::new("T1", "pong"));
/// ```
pub struct FnCallback<S, E> {
    on_success: S,
    on_exception: E,
}

impl<S, E> FnCallback<S, E>
where
    S: FnMut(Message) + Send,
    E: FnMut(&ClientError) + Send,
{
    pub fn new(on_success: S, on_exception: E) -> Self {
        Self {
            on_success,
            on_exception,
        }
    }
}

impl<S, E> RequestCallback for FnCallback<S, E>
where
    S: FnMut(Message) + Send,
    E: FnMut(&ClientError) + Send,
{
    fn on_success(&mut self, message: Message) {
        (self.on_success)(message)
    }

    fn on_exception(&mut self, error: &ClientError) {
        (self.on_exception)(error)
    }
}
