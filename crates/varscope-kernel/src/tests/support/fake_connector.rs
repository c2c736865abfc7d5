//! Scriptable connector that records every interaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connector::{
    BroadcastListener, CompletionCallback, ConnectorError, KernelConnector, ReadyCallback,
    ReplyCallback, SubscriptionId,
};
use crate::message::{ExecuteRequest, KernelMessage, RequestId};

/// Session name attached to broadcasts from the fake.
const SESSION: &str = "session-1";

/// Test double whose callbacks are driven explicitly by the test.
///
/// The internal lock is never held while a callback runs, so inspectors may
/// call back into the connector from inside their handlers.
#[derive(Clone)]
pub struct FakeConnector {
    shared: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    kernel_name: String,
    ready: bool,
    ready_callbacks: Vec<ReadyCallback>,
    requests: Vec<ExecuteRequest>,
    pending: HashMap<RequestId, PendingFetch>,
    listeners: Vec<(SubscriptionId, BroadcastListener)>,
    next_subscription: u64,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    fetch_failure: Option<String>,
    subscribe_failure: Option<String>,
    unsubscribe_reply: Option<(RequestId, KernelMessage)>,
}

struct PendingFetch {
    on_reply: Option<ReplyCallback>,
    on_complete: CompletionCallback,
}

impl FakeConnector {
    /// Creates a connector for the named kernel.
    pub fn new(kernel_name: &str) -> Self {
        Self {
            shared: Arc::new(Mutex::new(FakeState {
                kernel_name: kernel_name.to_owned(),
                ..FakeState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the kernel ready and runs queued readiness callbacks.
    pub fn make_ready(&self) {
        let callbacks = {
            let mut state = self.state();
            state.ready = true;
            std::mem::take(&mut state.ready_callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Makes subsequent fetches fail with `message`.
    pub fn fail_fetches(&self, message: &str) {
        self.state().fetch_failure = Some(message.to_owned());
    }

    /// Makes subsequent subscriptions fail with `message`.
    pub fn fail_subscriptions(&self, message: &str) {
        self.state().subscribe_failure = Some(message.to_owned());
    }

    /// Delivers `message` to `request` from inside the next `unsubscribe`
    /// call, as a connector thread racing disposal would.
    pub fn reply_on_unsubscribe(&self, request: RequestId, message: KernelMessage) {
        self.state().unsubscribe_reply = Some((request, message));
    }

    /// Whether a reply queued for `unsubscribe` is still waiting.
    pub fn has_unsubscribe_reply(&self) -> bool {
        self.state().unsubscribe_reply.is_some()
    }

    /// Every request submitted so far, in order.
    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.state().requests.clone()
    }

    /// Code of every request submitted so far, in order.
    pub fn codes(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.code)
            .collect()
    }

    /// Number of submitted requests whose code equals `code`.
    pub fn count_code(&self, code: &str) -> usize {
        self.codes().iter().filter(|entry| *entry == code).count()
    }

    /// Most recently submitted request.
    pub fn last_request(&self) -> ExecuteRequest {
        self.state()
            .requests
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no request was submitted"))
    }

    /// Most recent request whose code equals `code`.
    pub fn request_for(&self, code: &str) -> ExecuteRequest {
        self.requests()
            .into_iter()
            .rev()
            .find(|request| request.code == code)
            .unwrap_or_else(|| panic!("no request submitted for {code:?}"))
    }

    /// Delivers `message` to the reply callback of `request`.
    pub fn reply(&self, request: RequestId, message: &KernelMessage) {
        let callback = self
            .state()
            .pending
            .get_mut(&request)
            .and_then(|pending| pending.on_reply.take());
        let Some(mut callback) = callback else {
            panic!("request {request} has no live reply callback");
        };
        callback(message);
        if let Some(pending) = self.state().pending.get_mut(&request) {
            pending.on_reply = Some(callback);
        }
    }

    /// Delivers `message` as a reply parented to `request`.
    pub fn reply_parented(&self, request: RequestId, message: KernelMessage) {
        self.reply(request, &message.with_parent(request));
    }

    /// Finishes `request`, dropping its reply callback.
    pub fn complete(&self, request: RequestId, outcome: Result<(), ConnectorError>) {
        let pending = self.state().pending.remove(&request);
        let Some(pending) = pending else {
            panic!("request {request} is not pending");
        };
        drop(pending.on_reply);
        (pending.on_complete)(outcome);
    }

    /// Finishes the latest request submitted with `code`.
    pub fn complete_code(&self, code: &str, outcome: Result<(), ConnectorError>) {
        let request = self.request_for(code);
        self.complete(request.id(), outcome);
    }

    /// Sends `message` to every broadcast listener.
    pub fn broadcast(&self, message: &KernelMessage) {
        let listeners: Vec<BroadcastListener> = self
            .state()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(SESSION, message);
        }
    }

    /// Number of live broadcast listeners.
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Number of `subscribe` calls observed.
    pub fn subscribe_calls(&self) -> usize {
        self.state().subscribe_calls
    }

    /// Number of `unsubscribe` calls observed.
    pub fn unsubscribe_calls(&self) -> usize {
        self.state().unsubscribe_calls
    }
}

impl KernelConnector for FakeConnector {
    fn kernel_name(&self) -> String {
        self.state().kernel_name.clone()
    }

    fn when_ready(&self, callback: ReadyCallback) {
        {
            let mut state = self.state();
            if !state.ready {
                state.ready_callbacks.push(callback);
                return;
            }
        }
        callback();
    }

    fn fetch(
        &self,
        request: ExecuteRequest,
        on_reply: ReplyCallback,
        on_complete: CompletionCallback,
    ) -> Result<(), ConnectorError> {
        let mut state = self.state();
        if let Some(message) = &state.fetch_failure {
            return Err(ConnectorError::new(message.clone()));
        }
        state.pending.insert(
            request.id(),
            PendingFetch {
                on_reply: Some(on_reply),
                on_complete,
            },
        );
        state.requests.push(request);
        Ok(())
    }

    fn subscribe(&self, listener: BroadcastListener) -> Result<SubscriptionId, ConnectorError> {
        let mut state = self.state();
        state.subscribe_calls += 1;
        if let Some(message) = &state.subscribe_failure {
            return Err(ConnectorError::new(message.clone()));
        }
        state.next_subscription += 1;
        let subscription = SubscriptionId::new(state.next_subscription);
        state.listeners.push((subscription, listener));
        Ok(subscription)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let (removed, queued) = {
            let mut state = self.state();
            state.unsubscribe_calls += 1;
            let before = state.listeners.len();
            state.listeners.retain(|(id, _)| *id != subscription);
            (
                state.listeners.len() != before,
                state.unsubscribe_reply.take(),
            )
        };
        if let Some((request, message)) = queued {
            self.reply(request, &message);
        }
        removed
    }
}
