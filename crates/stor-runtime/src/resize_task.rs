use std::{
    io,
    process::ExitStatus,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use stor_core::{extract_argument, CommandTemplate};
use tokio::{
    process::{Child, ChildStdout},
    sync::Notify,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    invalid_argument_reply, reply_sink::lock_unpoisoned, resize_status_reply, CommandRunner,
    CooperativeCancellationToken, OutputLineReader, ServiceRequest, TransportError,
    REPLY_RESIZE_COMPLETED, REPLY_RESIZE_FAILED, REPLY_RESIZE_START,
};

const DEFAULT_RESIZE_ARGUMENT_FIELD: &str = "size";

/// How a resize run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Output was exhausted, the child exited, and the completion reply went out.
    Completed,
    /// A reply could not be delivered; no completion reply was sent.
    Failed,
    /// The run was stopped through its cancellation token.
    Cancelled,
}

#[derive(Debug)]
struct ActiveResize {
    run_id: u64,
    cancellation: CooperativeCancellationToken,
    join: Option<JoinHandle<ResizeOutcome>>,
}

#[derive(Debug, Default)]
struct ResizeCoordinatorInner {
    slot: Mutex<Option<ActiveResize>>,
    next_run_id: AtomicU64,
    idle: Notify,
}

impl ResizeCoordinatorInner {
    fn release_slot(&self, run_id: u64) {
        {
            let mut slot = lock_unpoisoned(&self.slot);
            if slot.as_ref().is_some_and(|active| active.run_id == run_id) {
                *slot = None;
            }
        }
        self.idle.notify_waiters();
    }
}

/// Owns the single media-resize slot of one service instance.
///
/// At most one resize runs at a time. The slot is checked before a start and
/// cleared on every terminal transition.
#[derive(Debug, Clone, Default)]
pub struct ResizeCoordinator {
    inner: Arc<ResizeCoordinatorInner>,
}

impl ResizeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        lock_unpoisoned(&self.inner.slot).is_some()
    }

    /// Handles a start-resize request.
    ///
    /// Replies `start` once the child is running and hands the rest of the
    /// conversation to a background task that keeps the request alive.
    pub async fn start(
        &self,
        request: Arc<ServiceRequest>,
        template: &CommandTemplate,
        runner: &CommandRunner,
        max_reply_bytes: usize,
    ) -> Result<(), TransportError> {
        if self.is_running() {
            info!("resize already running; rejecting start");
            return request.respond(REPLY_RESIZE_FAILED).await;
        }

        let field = template
            .argument_field()
            .unwrap_or(DEFAULT_RESIZE_ARGUMENT_FIELD);
        let size = match extract_argument(request.payload(), field) {
            Ok(size) => size,
            Err(error) => {
                info!(%error, "rejected resize argument");
                return request.respond(&invalid_argument_reply(field)).await;
            }
        };
        let command = match template.render(Some(&size)) {
            Ok(command) => command,
            Err(error) => {
                warn!(%error, "resize template misconfigured");
                return request.respond(REPLY_RESIZE_FAILED).await;
            }
        };

        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancellation = CooperativeCancellationToken::new();
        let reserved = {
            let mut slot = lock_unpoisoned(&self.inner.slot);
            let free = slot.is_none();
            if free {
                *slot = Some(ActiveResize {
                    run_id,
                    cancellation: cancellation.clone(),
                    join: None,
                });
            }
            free
        };
        if !reserved {
            info!("resize already running; rejecting start");
            return request.respond(REPLY_RESIZE_FAILED).await;
        }

        let mut child = match runner.spawn(&command) {
            Ok(child) => child,
            Err(error) => {
                self.inner.release_slot(run_id);
                warn!(command = %command, %error, "failed to start resize");
                return request.respond(REPLY_RESIZE_FAILED).await;
            }
        };
        let Some(stdout) = child.stdout.take() else {
            if let Err(error) = child.start_kill() {
                warn!(command = %command, %error, "failed to kill resize without stdout");
            }
            self.inner.release_slot(run_id);
            warn!(command = %command, "resize stdout was not captured");
            return request.respond(REPLY_RESIZE_FAILED).await;
        };
        let guard = ResizeRunGuard {
            inner: Arc::clone(&self.inner),
            run_id,
            request: Some(Arc::clone(&request)),
            child: Some(child),
        };
        info!(run_id, command = %command, "resize started");

        if let Err(error) = request.respond(REPLY_RESIZE_START).await {
            warn!(run_id, %error, "failed to acknowledge resize start");
            drop(guard);
            return Err(error);
        }

        let join = tokio::spawn(stream_resize_output(
            guard,
            stdout,
            runner.max_line_bytes(),
            max_reply_bytes,
            cancellation,
        ));
        let mut slot = lock_unpoisoned(&self.inner.slot);
        match slot.as_mut() {
            Some(active) if active.run_id == run_id => active.join = Some(join),
            // The run already finished and released the slot.
            _ => drop(join),
        }
        Ok(())
    }

    /// Handles a kill-resize request.
    pub async fn kill(&self, request: &ServiceRequest) -> Result<(), TransportError> {
        if !self.cancel_active().await {
            info!("no resize running; nothing to kill");
            return request.respond(REPLY_RESIZE_FAILED).await;
        }
        request.respond(REPLY_RESIZE_COMPLETED).await
    }

    /// Stops the active run and waits for its cleanup. Returns false when idle.
    pub async fn cancel_active(&self) -> bool {
        let active = {
            let mut slot = lock_unpoisoned(&self.inner.slot);
            slot.as_mut()
                .map(|active| (active.run_id, active.cancellation.clone(), active.join.take()))
        };
        let Some((run_id, cancellation, join)) = active else {
            return false;
        };

        info!(run_id, "cancelling resize");
        cancellation.cancel();
        if let Some(join) = join {
            join.abort();
            match join.await {
                Ok(outcome) => debug!(run_id, ?outcome, "resize ended before abort"),
                Err(error) if error.is_cancelled() => debug!(run_id, "resize task aborted"),
                Err(error) => warn!(run_id, %error, "resize task failed"),
            }
        }
        self.inner.release_slot(run_id);
        true
    }

    /// Resolves once no resize is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// Resources held by one resize run; released on drop, which also covers abort.
struct ResizeRunGuard {
    inner: Arc<ResizeCoordinatorInner>,
    run_id: u64,
    request: Option<Arc<ServiceRequest>>,
    child: Option<Child>,
}

impl ResizeRunGuard {
    async fn respond(&self, reply: &str) -> Result<(), TransportError> {
        match self.request.as_ref() {
            Some(request) => request.respond(reply).await,
            None => Err(TransportError::Closed),
        }
    }

    async fn wait_child(&mut self) -> Option<io::Result<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => Some(child.wait().await),
            None => None,
        }
    }
}

impl Drop for ResizeRunGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        self.request.take();
        debug!(run_id = self.run_id, "resize cleanup released child and request");
        self.inner.release_slot(self.run_id);
    }
}

async fn stream_resize_output(
    mut guard: ResizeRunGuard,
    stdout: ChildStdout,
    max_line_bytes: usize,
    max_reply_bytes: usize,
    cancellation: CooperativeCancellationToken,
) -> ResizeOutcome {
    let run_id = guard.run_id;
    let mut reader = OutputLineReader::new(stdout, max_line_bytes);
    loop {
        let next = tokio::select! {
            _ = cancellation.cancelled() => {
                info!(run_id, "resize cancelled while streaming");
                return ResizeOutcome::Cancelled;
            }
            next = reader.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                warn!(run_id, %error, "failed to read resize output");
                break;
            }
        };
        let reply = match resize_status_reply(&line, max_reply_bytes) {
            Ok((reply, truncated)) => {
                if truncated {
                    warn!(
                        run_id,
                        line_bytes = line.len(),
                        max_reply_bytes,
                        "resize status line truncated to fit reply"
                    );
                }
                reply
            }
            Err(error) => {
                warn!(run_id, %error, "reply limit too small for resize status; abandoning run");
                return ResizeOutcome::Failed;
            }
        };
        if let Err(error) = guard.respond(&reply).await {
            warn!(run_id, %error, "resize status reply failed; abandoning run");
            return ResizeOutcome::Failed;
        }
    }
    // Close our end of the pipe so a child still writing cannot block its exit.
    drop(reader);

    let exit = tokio::select! {
        _ = cancellation.cancelled() => {
            info!(run_id, "resize cancelled while waiting for exit");
            return ResizeOutcome::Cancelled;
        }
        exit = guard.wait_child() => exit,
    };
    match exit {
        Some(Ok(status)) => info!(run_id, exit_code = ?status.code(), "resize process exited"),
        Some(Err(error)) => warn!(run_id, %error, "failed to collect resize exit status"),
        None => {}
    }

    if let Err(error) = guard.respond(REPLY_RESIZE_COMPLETED).await {
        warn!(run_id, %error, "resize completion reply failed");
        return ResizeOutcome::Failed;
    }
    ResizeOutcome::Completed
}
