//! Kernel-backed variable inspector.
//!
//! [`KernelInspector`] runs the initialisation script once the connector is
//! ready, then subscribes to the broadcast channel so that code executed by
//! anyone else on the kernel triggers a fresh inspection. All connector
//! callbacks hold a weak reference to the shared context; dropping or
//! disposing the inspector severs them.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use flume::Receiver;
use tracing::{debug, error, info, warn};
use varscope_config::{InspectorConfig, OwnTrafficPolicy};

use crate::connector::{
    BroadcastListener, CompletionCallback, ConnectorError, KernelConnector, ReplyCallback,
    SubscriptionId,
};
use crate::errors::{InspectionFailure, InspectorError, InspectorOperation};
use crate::inspector::VariableInspector;
use crate::matrix::{MatrixModel, MatrixRequest, MatrixSettler};
use crate::message::{ExecuteRequest, KernelMessage, MessageKind, RequestId};
use crate::payload::KernelReply;
use crate::signal::Signal;
use crate::update::{InspectionTitle, InspectionUpdate};

/// Log target for inspector operations.
pub(crate) const INSPECTOR_TARGET: &str = "varscope_kernel::inspector";

/// Observable lifecycle of a [`KernelInspector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorState {
    /// Constructed, nothing registered with the connector yet.
    Created,
    /// Waiting for the connector to report readiness.
    AwaitingReady,
    /// The initialisation script has been submitted.
    Initializing,
    /// Subscribed to the broadcast channel; automatic re-inspection is armed.
    Subscribed,
    /// Disposed; no further updates are emitted.
    Disposed,
}

enum Lifecycle {
    Created,
    AwaitingReady,
    Initializing,
    Subscribed(SubscriptionId),
    Disposed,
}

impl Lifecycle {
    const fn state(&self) -> InspectorState {
        match self {
            Self::Created => InspectorState::Created,
            Self::AwaitingReady => InspectorState::AwaitingReady,
            Self::Initializing => InspectorState::Initializing,
            Self::Subscribed(_) => InspectorState::Subscribed,
            Self::Disposed => InspectorState::Disposed,
        }
    }
}

/// Inspector that queries a live kernel through a [`KernelConnector`].
pub struct KernelInspector {
    shared: Arc<Shared>,
}

struct Shared {
    connector: Arc<dyn KernelConnector>,
    config: InspectorConfig,
    kernel_name: String,
    lifecycle: Mutex<Lifecycle>,
    own_requests: Mutex<HashSet<RequestId>>,
    inspected: Signal<InspectionUpdate>,
    disposed: Signal<()>,
    failures: Signal<InspectionFailure>,
}

impl KernelInspector {
    /// Builds an inspector and starts waiting for the kernel to become ready.
    ///
    /// # Errors
    ///
    /// Returns [`InspectorError::Config`] when a required command is empty.
    pub fn new(
        connector: Arc<dyn KernelConnector>,
        config: InspectorConfig,
    ) -> Result<Self, InspectorError> {
        config.validate()?;
        let kernel_name = connector.kernel_name();
        let shared = Arc::new(Shared {
            connector,
            config,
            kernel_name,
            lifecycle: Mutex::new(Lifecycle::Created),
            own_requests: Mutex::new(HashSet::new()),
            inspected: Signal::new(),
            disposed: Signal::new(),
            failures: Signal::new(),
        });
        Shared::await_ready(&shared);
        Ok(Self { shared })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> InspectorState {
        self.shared.lifecycle().state()
    }

    /// Configuration the inspector was built with.
    #[must_use]
    pub fn config(&self) -> &InspectorConfig {
        &self.shared.config
    }

    /// Submits a plain inspection and returns its request ID.
    ///
    /// The resulting update, if any, arrives on the inspected signal.
    ///
    /// # Errors
    ///
    /// Fails when the inspector is disposed or the connector rejects the
    /// request.
    pub fn submit_inspection(&self) -> Result<RequestId, InspectorError> {
        Shared::submit_inspection(&self.shared)
    }

    /// Submits a table inspection limited to `max_rows` rows.
    ///
    /// The code submitted is `{matrix_query_command}({name}, {max_rows})`.
    pub fn perform_matrix_inspection_with_limit(
        &self,
        name: &str,
        max_rows: usize,
    ) -> MatrixRequest {
        let code = format!(
            "{}({name}, {max_rows})",
            self.shared.config.matrix_query_command()
        );
        Shared::submit_matrix(&self.shared, code)
    }

    /// Submits a delete request and returns its request ID.
    ///
    /// # Errors
    ///
    /// Fails when no delete command is configured, the inspector is
    /// disposed, or the connector rejects the request.
    pub fn submit_delete(&self, name: &str) -> Result<RequestId, InspectorError> {
        let Some(command) = self.shared.config.delete_command() else {
            return Err(InspectorError::unsupported(
                InspectorOperation::Delete,
                "no delete command is configured",
            ));
        };
        let code = format!("{command}('{name}')");
        Shared::submit_query(&self.shared, InspectorOperation::Delete, code)
    }
}

impl VariableInspector for KernelInspector {
    fn perform_inspection(&self) -> Result<(), InspectorError> {
        self.submit_inspection().map(|_| ())
    }

    fn perform_matrix_inspection(&self, name: &str) -> MatrixRequest {
        let code = format!("{}({name})", self.shared.config.matrix_query_command());
        Shared::submit_matrix(&self.shared, code)
    }

    fn perform_delete(&self, name: &str) -> Result<(), InspectorError> {
        self.submit_delete(name).map(|_| ())
    }

    fn subscribe_inspected(&self) -> Receiver<InspectionUpdate> {
        self.shared.inspected.subscribe()
    }

    fn subscribe_disposed(&self) -> Receiver<()> {
        self.shared.disposed.subscribe()
    }

    fn subscribe_failures(&self) -> Receiver<InspectionFailure> {
        self.shared.failures.subscribe()
    }

    fn dispose(&self) {
        self.shared.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl Drop for KernelInspector {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl fmt::Debug for KernelInspector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KernelInspector")
            .field("kernel", &self.shared.kernel_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn own_requests(&self) -> MutexGuard<'_, HashSet<RequestId>> {
        self.own_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Disposed)
    }

    fn await_ready(this: &Arc<Self>) {
        {
            let mut lifecycle = this.lifecycle();
            if !matches!(*lifecycle, Lifecycle::Created) {
                return;
            }
            *lifecycle = Lifecycle::AwaitingReady;
        }

        debug!(
            target: INSPECTOR_TARGET,
            kernel = %this.kernel_name,
            "waiting for kernel readiness"
        );
        let weak = Arc::downgrade(this);
        this.connector.when_ready(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                Self::on_ready(&shared);
            }
        }));
    }

    fn on_ready(this: &Arc<Self>) {
        {
            let mut lifecycle = this.lifecycle();
            if !matches!(*lifecycle, Lifecycle::AwaitingReady) {
                debug!(
                    target: INSPECTOR_TARGET,
                    state = ?lifecycle.state(),
                    "ignoring readiness signal"
                );
                return;
            }
            *lifecycle = Lifecycle::Initializing;
        }

        let request = ExecuteRequest::new(this.config.init_script());
        let id = request.id();
        info!(
            target: INSPECTOR_TARGET,
            kernel = %this.kernel_name,
            %id,
            "kernel ready, running initialisation script"
        );

        let weak = Arc::downgrade(this);
        let on_complete: CompletionCallback = Box::new(move |outcome: Result<(), ConnectorError>| {
            if let Some(shared) = weak.upgrade() {
                Self::on_initialised(&shared, id, outcome);
            }
        });

        let submitted = this.dispatch(
            InspectorOperation::Initialise,
            request,
            Box::new(|_: &KernelMessage| {}),
            on_complete,
        );
        if let Err(error) = submitted {
            this.report_failure(InspectorOperation::Initialise, Some(id), &error);
        }
    }

    fn on_initialised(this: &Arc<Self>, id: RequestId, outcome: Result<(), ConnectorError>) {
        this.untrack(id);
        if let Err(source) = outcome {
            let error = InspectorError::connector(InspectorOperation::Initialise, source);
            this.report_failure(InspectorOperation::Initialise, Some(id), &error);
            return;
        }

        if !matches!(*this.lifecycle(), Lifecycle::Initializing) {
            debug!(
                target: INSPECTOR_TARGET,
                "initialisation finished after the inspector left initialisation"
            );
            return;
        }

        let weak = Arc::downgrade(this);
        let listener: BroadcastListener = Arc::new(move |session: &str, message: &KernelMessage| {
            if let Some(shared) = weak.upgrade() {
                Self::on_broadcast(&shared, session, message);
            }
        });

        let subscription = match this.connector.subscribe(listener) {
            Ok(subscription) => subscription,
            Err(source) => {
                let error = InspectorError::connector(InspectorOperation::Subscribe, source);
                this.report_failure(InspectorOperation::Subscribe, None, &error);
                return;
            }
        };

        let mut lifecycle = this.lifecycle();
        if matches!(*lifecycle, Lifecycle::Initializing) {
            *lifecycle = Lifecycle::Subscribed(subscription);
            drop(lifecycle);
            info!(
                target: INSPECTOR_TARGET,
                kernel = %this.kernel_name,
                subscription = subscription.get(),
                "subscribed to kernel broadcasts"
            );
        } else {
            // Disposed while subscribing.
            drop(lifecycle);
            this.connector.unsubscribe(subscription);
        }
    }

    fn on_broadcast(this: &Arc<Self>, session: &str, message: &KernelMessage) {
        if message.kind != MessageKind::ExecuteInput || this.is_disposed() {
            return;
        }
        if this.is_own_traffic(message) {
            debug!(
                target: INSPECTOR_TARGET,
                session,
                "skipping inspector's own execution"
            );
            return;
        }

        debug!(
            target: INSPECTOR_TARGET,
            session,
            "foreign execution observed, refreshing inspection"
        );
        if let Err(error) = Self::submit_inspection(this) {
            warn!(
                target: INSPECTOR_TARGET,
                error = %error,
                "automatic re-inspection failed"
            );
        }
    }

    fn is_own_traffic(&self, message: &KernelMessage) -> bool {
        let tagged = message
            .parent_id
            .is_some_and(|parent| self.own_requests().contains(&parent));
        let verbatim = || {
            message.code().is_some_and(|code| {
                code == self.config.query_command() || code == self.config.matrix_query_command()
            })
        };
        match self.config.own_traffic() {
            // Unparented echoes cannot carry a tag.
            OwnTrafficPolicy::RequestTagOnly => {
                tagged || (message.parent_id.is_none() && verbatim())
            }
            OwnTrafficPolicy::CodeOrRequestTag => tagged || verbatim(),
        }
    }

    fn submit_inspection(this: &Arc<Self>) -> Result<RequestId, InspectorError> {
        let code = this.config.query_command().to_owned();
        Self::submit_query(this, InspectorOperation::Inspect, code)
    }

    /// Submits `code` and routes its replies through the query interpreter.
    fn submit_query(
        this: &Arc<Self>,
        operation: InspectorOperation,
        code: String,
    ) -> Result<RequestId, InspectorError> {
        if this.is_disposed() {
            return Err(InspectorError::disposed(operation));
        }

        let request = ExecuteRequest::new(code);
        let id = request.id();
        let weak = Arc::downgrade(this);
        let on_reply: ReplyCallback = Box::new(move |message: &KernelMessage| {
            if let Some(shared) = weak.upgrade() {
                shared.on_query_reply(operation, id, message);
            }
        });
        let on_complete = Self::untrack_on_complete(this, id);
        this.dispatch(operation, request, on_reply, on_complete)
    }

    fn submit_matrix(this: &Arc<Self>, code: String) -> MatrixRequest {
        let operation = InspectorOperation::MatrixInspect;
        if this.is_disposed() {
            return MatrixRequest::rejected(InspectorError::disposed(operation));
        }

        let request = ExecuteRequest::new(code);
        let id = request.id();
        let (mut settler, pending) = MatrixRequest::pending(id);
        let on_reply: ReplyCallback = Box::new(move |message: &KernelMessage| {
            settle_matrix_reply(&mut settler, id, message);
        });
        let on_complete = Self::untrack_on_complete(this, id);
        match this.dispatch(operation, request, on_reply, on_complete) {
            Ok(_) => pending,
            Err(error) => MatrixRequest::rejected(error),
        }
    }

    fn dispatch(
        &self,
        operation: InspectorOperation,
        request: ExecuteRequest,
        on_reply: ReplyCallback,
        on_complete: CompletionCallback,
    ) -> Result<RequestId, InspectorError> {
        let id = request.id();
        debug!(
            target: INSPECTOR_TARGET,
            %id,
            %operation,
            "submitting execute request"
        );

        // Tracked before submission: connectors may echo traffic synchronously.
        self.own_requests().insert(id);
        self.connector
            .fetch(request, on_reply, on_complete)
            .map_err(|source| {
                self.untrack(id);
                InspectorError::connector(operation, source)
            })?;
        Ok(id)
    }

    fn untrack_on_complete(this: &Arc<Self>, id: RequestId) -> CompletionCallback {
        let weak: Weak<Self> = Arc::downgrade(this);
        Box::new(move |outcome: Result<(), ConnectorError>| {
            if let Err(error) = &outcome {
                debug!(
                    target: INSPECTOR_TARGET,
                    %id,
                    error = %error,
                    "request completed with a transport error"
                );
            }
            if let Some(shared) = weak.upgrade() {
                shared.untrack(id);
            }
        })
    }

    fn untrack(&self, id: RequestId) {
        self.own_requests().remove(&id);
    }

    fn on_query_reply(
        &self,
        operation: InspectorOperation,
        id: RequestId,
        message: &KernelMessage,
    ) {
        if !message.answers(id) {
            debug!(
                target: INSPECTOR_TARGET,
                %id,
                parent = ?message.parent_id,
                "ignoring reply for another request"
            );
            return;
        }

        match KernelReply::classify(message) {
            Ok(KernelReply::Update(payload)) => {
                let title = InspectionTitle {
                    kernel_name: self.kernel_name.clone(),
                    context_name: String::new(),
                };
                let delivered = self.inspected.emit(&InspectionUpdate::new(title, payload));
                debug!(
                    target: INSPECTOR_TARGET,
                    %id,
                    delivered,
                    "published inspection update"
                );
            }
            Ok(KernelReply::Error(kernel_error)) => {
                debug!(
                    target: INSPECTOR_TARGET,
                    %id,
                    error = %kernel_error,
                    "kernel error while inspecting; no update published"
                );
            }
            Ok(KernelReply::Unrecognised(_)) => {}
            Err(source) => {
                let error = InspectorError::malformed(operation, source);
                self.report_failure(operation, Some(id), &error);
            }
        }
    }

    fn report_failure(
        &self,
        operation: InspectorOperation,
        request: Option<RequestId>,
        error: &InspectorError,
    ) {
        error!(
            target: INSPECTOR_TARGET,
            kernel = %self.kernel_name,
            %operation,
            request = ?request,
            error = %error,
            "inspection failed"
        );
        self.failures
            .emit(&InspectionFailure::new(operation, request, error.to_string()));
    }

    fn dispose(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle();
            if matches!(*lifecycle, Lifecycle::Disposed) {
                return;
            }
            std::mem::replace(&mut *lifecycle, Lifecycle::Disposed)
        };

        // Closed before the connector is touched so replies racing the
        // unsubscribe cannot reach subscribers.
        self.inspected.close();
        self.failures.close();

        if let Lifecycle::Subscribed(subscription) = previous
            && !self.connector.unsubscribe(subscription)
        {
            debug!(
                target: INSPECTOR_TARGET,
                subscription = subscription.get(),
                "broadcast subscription was already removed"
            );
        }

        self.disposed.emit(&());
        self.disposed.close();
        self.own_requests().clear();
        info!(
            target: INSPECTOR_TARGET,
            kernel = %self.kernel_name,
            "inspector disposed"
        );
    }
}

fn settle_matrix_reply(settler: &mut MatrixSettler, id: RequestId, message: &KernelMessage) {
    if settler.is_settled() || !message.answers(id) {
        return;
    }

    let operation = InspectorOperation::MatrixInspect;
    match KernelReply::classify(message) {
        Ok(KernelReply::Update(payload)) => settler.settle(
            MatrixModel::from_value(payload)
                .map_err(|source| InspectorError::malformed(operation, source)),
        ),
        Ok(KernelReply::Error(kernel_error)) => {
            warn!(
                target: INSPECTOR_TARGET,
                %id,
                error = %kernel_error,
                "kernel error on matrix query"
            );
            settler.settle(Err(InspectorError::kernel(operation, kernel_error)));
        }
        Ok(KernelReply::Unrecognised(_)) => {}
        Err(source) => settler.settle(Err(InspectorError::malformed(operation, source))),
    }
}
