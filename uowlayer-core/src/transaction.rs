//! Transaction options, the caller-facing transaction context, and the scope
//! handed to operations running inside a transaction.
//!
//! A [`TransactionContext`] is what the caller supplies: optional options,
//! an optional session to reuse, and a cancellation token. The coordinator
//! turns it into a [`TransactionScope`], which owns the session for the
//! duration of the call and carries the tracing span every log line of the
//! transaction is recorded under.

use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Which members of a replica set reads may be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreferenceMode {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Isolation level of reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConcernLevel {
    Local,
    Majority,
    #[default]
    Snapshot,
    Available,
    Linearizable,
}

/// Acknowledgement required for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteConcernLevel {
    /// Acknowledged by a majority of voting members.
    #[default]
    Majority,
    /// Acknowledged by the given number of members.
    Nodes(u32),
}

/// Options a transaction is started with.
///
/// The default is the profile used whenever the caller supplies none:
/// read preference primary, read concern snapshot, write concern majority.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub read_preference: ReadPreferenceMode,
    pub read_concern: ReadConcernLevel,
    pub write_concern: WriteConcernLevel,
    /// Upper bound on the time the commit may take on the server.
    pub max_commit_time: Option<Duration>,
}

impl TransactionOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_preference(mut self, read_preference: ReadPreferenceMode) -> Self {
        self.read_preference = read_preference;
        self
    }

    pub fn with_read_concern(mut self, read_concern: ReadConcernLevel) -> Self {
        self.read_concern = read_concern;
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcernLevel) -> Self {
        self.write_concern = write_concern;
        self
    }

    pub fn with_max_commit_time(mut self, max_commit_time: Duration) -> Self {
        self.max_commit_time = Some(max_commit_time);
        self
    }
}

/// Caller-supplied inputs of a transaction.
///
/// # Example
///
/// ```ignore
/// use uowlayer::transaction::{TransactionContext, TransactionOptions, ReadConcernLevel};
/// use tokio_util::sync::CancellationToken;
///
/// let context = TransactionContext::new(CancellationToken::new())
///     .with_options(TransactionOptions::new().with_read_concern(ReadConcernLevel::Majority));
/// ```
#[derive(Debug)]
pub struct TransactionContext<S> {
    /// Options to start the transaction with. The default profile when absent.
    pub options: Option<TransactionOptions>,
    /// A session to run the transaction on. A new one is started when absent.
    pub session: Option<S>,
    /// Cancels the operation; the transaction is aborted when triggered.
    pub cancellation: CancellationToken,
}

impl<S> TransactionContext<S> {
    /// Creates a context with default options and a fresh session.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            options: None,
            session: None,
            cancellation,
        }
    }

    /// Sets the transaction options.
    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Runs the transaction on an existing session instead of starting one.
    pub fn with_session(mut self, session: S) -> Self {
        self.session = Some(session);
        self
    }
}

impl<S> Default for TransactionContext<S> {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

/// Lifecycle of one transactional call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    SessionAcquired,
    TransactionStarted,
    OperationRunning,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "idle",
            TransactionState::SessionAcquired => "session-acquired",
            TransactionState::TransactionStarted => "transaction-started",
            TransactionState::OperationRunning => "operation-running",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        };

        f.write_str(name)
    }
}

/// The transaction as seen by a running operation.
///
/// Owns the session until the call completes. The span is created together
/// with the scope; operations can attach their own events to it through
/// [`TransactionScope::span`].
#[derive(Debug)]
pub struct TransactionScope<S> {
    session: S,
    options: TransactionOptions,
    cancellation: CancellationToken,
    span: Span,
    state: TransactionState,
}

impl<S> TransactionScope<S> {
    pub(crate) fn new(
        session: S,
        options: TransactionOptions,
        cancellation: CancellationToken,
        span: Span,
    ) -> Self {
        Self {
            session,
            options,
            cancellation,
            span,
            state: TransactionState::SessionAcquired,
        }
    }

    /// The session the transaction runs on. Pass it to repository calls.
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// The options the transaction was started with.
    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The span the transaction is traced under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        tracing::trace!(parent: &self.span, from = %self.state, to = %state, "transaction state");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_primary_snapshot_majority() {
        let options = TransactionOptions::default();

        assert_eq!(options.read_preference, ReadPreferenceMode::Primary);
        assert_eq!(options.read_concern, ReadConcernLevel::Snapshot);
        assert_eq!(options.write_concern, WriteConcernLevel::Majority);
        assert_eq!(options.max_commit_time, None);
    }

    #[test]
    fn scope_tracks_state() {
        let mut scope = TransactionScope::new(
            "session",
            TransactionOptions::default(),
            CancellationToken::new(),
            Span::none(),
        );

        assert_eq!(scope.state(), TransactionState::SessionAcquired);
        scope.set_state(TransactionState::TransactionStarted);
        assert_eq!(scope.state(), TransactionState::TransactionStarted);
        assert_eq!(*scope.session(), "session");
    }

    #[test]
    fn context_defaults_to_a_fresh_session() {
        let context: TransactionContext<()> = TransactionContext::default();

        assert!(context.options.is_none());
        assert!(context.session.is_none());
        assert!(!context.cancellation.is_cancelled());
    }
}
