use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};

use super::report::{FlowReport, FlowState};
use crate::core::events::{Event, EventBus, EventKind, SubscriptionToken};
use crate::core::transport::{OwnershipArbiter, SerialTransport};
use crate::domain::command::{Command, Flow, FlowStep, OwnerId};
use crate::domain::config::TimingSettings;
use crate::domain::error::{AtCliError, AtCliResult};

/// Runs flows step by step under a single lease.
pub struct FlowRunner {
    transport: Arc<SerialTransport>,
    bus: Arc<EventBus>,
    timing: TimingSettings,
    span: Span,
}

/// Releases the lease when dropped, on every exit path after a successful acquire.
struct Lease<'a> {
    arbiter: &'a OwnershipArbiter,
    owner: &'a OwnerId,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.arbiter.release(self.owner);
    }
}

/// Unsubscribes the step's response handler when dropped.
struct StepSubscription<'a> {
    bus: &'a EventBus,
    token: SubscriptionToken,
}

impl Drop for StepSubscription<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.token);
    }
}

/// Tracks which expected responses of the current step are still outstanding.
struct StepTracker {
    state: Mutex<TrackerState>,
}

struct TrackerState {
    remaining: BTreeSet<String>,
    done: Option<oneshot::Sender<()>>,
}

impl StepTracker {
    fn new(expected: &BTreeSet<String>) -> (Arc<Self>, oneshot::Receiver<()>) {
        let (done, satisfied) = oneshot::channel();
        let tracker = Self {
            state: Mutex::new(TrackerState {
                remaining: expected.clone(),
                done: Some(done),
            }),
        };
        (Arc::new(tracker), satisfied)
    }

    /// Exact-match a device line against the outstanding expectations.
    /// Returns true if the line satisfied one of them.
    fn observe(&self, line: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.remaining.remove(line) {
            return false;
        }
        if state.remaining.is_empty() {
            if let Some(done) = state.done.take() {
                let _ = done.send(());
            }
        }
        true
    }

    fn missing(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.remaining.iter().cloned().collect()
    }
}

impl FlowRunner {
    pub fn new(
        transport: Arc<SerialTransport>,
        bus: Arc<EventBus>,
        timing: TimingSettings,
        span: Span,
    ) -> Self {
        Self {
            transport,
            bus,
            timing,
            span,
        }
    }

    /// Execute a flow to completion, abort or cancellation.
    ///
    /// Every failure is also published as a transport-error event, so callers
    /// that only listen to the bus see the same outcome as the returned report.
    pub async fn run(&self, flow: Flow, cancel: CancellationToken) -> FlowReport {
        let owner = OwnerId::for_flow();
        let mut report = FlowReport::new(owner.clone(), &flow);
        let arbiter = self.transport.arbiter();

        self.transition(&mut report, FlowState::AcquiringLease);
        let acquired = tokio::select! {
            result = arbiter.acquire(&owner, self.timing.lease_timeout()) => result,
            _ = cancel.cancelled() => Err(AtCliError::FlowCancelled { step: 0 }),
        };
        if let Err(e) = acquired {
            self.fail(&mut report, e);
            return report;
        }

        let lease = Lease {
            arbiter,
            owner: &owner,
        };

        let mut failure = None;
        for (index, step) in flow.steps.iter().enumerate() {
            let number = index + 1;
            match self.run_step(&owner, number, step, &cancel, &mut report).await {
                Ok(()) => report.steps_completed = number,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.transition(&mut report, FlowState::ReleasingLease);
        drop(lease);

        match failure {
            Some(e) => self.fail(&mut report, e),
            None => {
                self.transition(&mut report, FlowState::Completed);
                info!(parent: &self.span, flow = flow.label(), %owner, steps = report.total_steps, "flow completed");
            }
        }
        report
    }

    async fn run_step(
        &self,
        owner: &OwnerId,
        number: usize,
        step: &FlowStep,
        cancel: &CancellationToken,
        report: &mut FlowReport,
    ) -> AtCliResult<()> {
        self.transition(report, FlowState::ExecutingStep(number));

        let (tracker, satisfied) = StepTracker::new(&step.expected_responses);
        let handler_tracker = Arc::clone(&tracker);
        let span = self.span.clone();
        let token = self.bus.subscribe(EventKind::ResponseReceived, move |event| {
            if let Event::ResponseReceived(response) = event {
                if !response.is_echo() && handler_tracker.observe(&response.text) {
                    debug!(parent: &span, step = number, response = %response.text, "got expected response");
                }
            }
            Ok(())
        });
        let _subscription = StepSubscription {
            bus: &self.bus,
            token,
        };

        info!(parent: &self.span, step = number, command = %step.command, "sending flow step");
        self.transport
            .send(&Command::owned(step.command.clone(), owner.clone()))?;

        if step.expected_responses.is_empty() {
            return Ok(());
        }

        self.transition(report, FlowState::AwaitingResponses(number));
        tokio::select! {
            _ = satisfied => Ok(()),
            _ = tokio::time::sleep(self.timing.step_timeout()) => Err(AtCliError::StepTimeout {
                step: number,
                command: step.command.clone(),
                missing: tracker.missing(),
            }),
            _ = cancel.cancelled() => Err(AtCliError::FlowCancelled { step: number }),
        }
    }

    fn transition(&self, report: &mut FlowReport, state: FlowState) {
        debug!(parent: &self.span, owner = %report.owner, from = %report.state, to = %state, "flow state");
        report.state = state;
    }

    fn fail(&self, report: &mut FlowReport, error: AtCliError) {
        warn!(parent: &self.span, owner = %report.owner, error = %error, "flow failed");
        let error = Arc::new(error);
        self.transition(report, FlowState::Failed);
        report.error = Some(Arc::clone(&error));
        self.bus.publish(Event::TransportError(error));
    }
}
