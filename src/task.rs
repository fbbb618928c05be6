//! Background task contract: progress channel + single-in-flight supersede.
//!
//! Splitting and matching each run as an isolated background task on a
//! dedicated thread, reporting to the caller through an asynchronous
//! channel: zero or more `Progress` messages, in order, followed by exactly
//! one terminal message (`Result` or `Error`).
//!
//! Each [`TaskRunner`] allows at most one in-flight task. Submitting a new
//! task while one is pending immediately delivers a terminal
//! [`EngineError::TaskSuperseded`] on the pending task's channel before the
//! new task starts; there is no queueing and no timeout. The superseded
//! worker keeps running, but every further message it tries to send is
//! suppressed, so a channel can never observe a second terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc;

use crate::error::EngineError;

/// One message on a task channel.
#[derive(Debug, Clone)]
pub enum TaskEvent<T> {
    /// Intermediate progress: `processed` out of `total` units done.
    Progress { processed: usize, total: usize },
    /// Terminal: the task finished with this value.
    Result(T),
    /// Terminal: the task failed (or was superseded).
    Error(EngineError),
}

/// Receiving end of one task's channel.
pub struct TaskHandle<T> {
    rx: mpsc::UnboundedReceiver<TaskEvent<T>>,
}

impl<T> TaskHandle<T> {
    /// Await the next event; `None` once the channel is drained.
    pub async fn recv(&mut self) -> Option<TaskEvent<T>> {
        self.rx.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for synchronous callers.
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<TaskEvent<T>> {
        self.rx.blocking_recv()
    }

    /// Drain progress events and await the terminal result.
    pub async fn wait(mut self) -> Result<T, EngineError> {
        while let Some(event) = self.rx.recv().await {
            match event {
                TaskEvent::Progress { .. } => continue,
                TaskEvent::Result(value) => return Ok(value),
                TaskEvent::Error(err) => return Err(err),
            }
        }
        Err(EngineError::Unknown(
            "task channel closed without a terminal event".into(),
        ))
    }

    /// Blocking variant of [`wait`](Self::wait).
    pub fn blocking_wait(mut self) -> Result<T, EngineError> {
        while let Some(event) = self.rx.blocking_recv() {
            match event {
                TaskEvent::Progress { .. } => continue,
                TaskEvent::Result(value) => return Ok(value),
                TaskEvent::Error(err) => return Err(err),
            }
        }
        Err(EngineError::Unknown(
            "task channel closed without a terminal event".into(),
        ))
    }
}

/// Sending side handed to a worker: progress plus the one terminal.
///
/// Progress callbacks must not block; sends are non-blocking (unbounded
/// channel) and become no-ops once the task has been superseded or a
/// terminal has gone out.
pub struct ProgressSink<T> {
    tx: mpsc::UnboundedSender<TaskEvent<T>>,
    superseded: Arc<AtomicBool>,
    terminal_sent: Arc<AtomicBool>,
}

impl<T> ProgressSink<T> {
    /// Emit one `(processed, total)` progress message.
    pub fn emit(&self, processed: usize, total: usize) {
        if self.superseded.load(Ordering::SeqCst) || self.terminal_sent.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(TaskEvent::Progress { processed, total });
    }

    /// Whether a newer request has taken over this task's slot.
    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::SeqCst)
    }

    fn finish(&self, outcome: Result<T, EngineError>) {
        // Whoever flips the flag first owns the terminal; a supersede racing
        // a normal completion can never double-send.
        if self
            .terminal_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let event = match outcome {
                Ok(value) => TaskEvent::Result(value),
                Err(err) => TaskEvent::Error(err),
            };
            let _ = self.tx.send(event);
        }
    }
}

struct ActiveTask<T> {
    tx: mpsc::UnboundedSender<TaskEvent<T>>,
    superseded: Arc<AtomicBool>,
    terminal_sent: Arc<AtomicBool>,
}

/// One logical worker slot: at most one in-flight task of type `T`.
pub struct TaskRunner<T> {
    active: Mutex<Option<ActiveTask<T>>>,
}

impl<T: Send + 'static> TaskRunner<T> {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Start `job` on a dedicated thread, superseding any pending task.
    ///
    /// The returned handle observes the job's progress and terminal. The
    /// job receives a [`ProgressSink`] and must return its terminal value;
    /// everything after a supersede is silently discarded.
    pub fn submit<F>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce(&ProgressSink<T>) -> Result<T, EngineError> + Send + 'static,
    {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = active.take() {
            prev.superseded.store(true, Ordering::SeqCst);
            if prev
                .terminal_sent
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let _ = prev.tx.send(TaskEvent::Error(EngineError::TaskSuperseded));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let superseded = Arc::new(AtomicBool::new(false));
        let terminal_sent = Arc::new(AtomicBool::new(false));
        *active = Some(ActiveTask {
            tx: tx.clone(),
            superseded: Arc::clone(&superseded),
            terminal_sent: Arc::clone(&terminal_sent),
        });

        let sink = ProgressSink {
            tx,
            superseded,
            terminal_sent,
        };
        thread::spawn(move || {
            let outcome = job(&sink);
            sink.finish(outcome);
        });

        TaskHandle { rx }
    }
}

impl<T: Send + 'static> Default for TaskRunner<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn progress_precedes_exactly_one_terminal() {
        let runner = TaskRunner::new();
        let mut handle = runner.submit(|sink| {
            for step in 1..=3 {
                sink.emit(step, 3);
            }
            Ok(42u32)
        });

        let mut events = Vec::new();
        while let Some(event) = handle.blocking_recv() {
            events.push(event);
        }

        assert_eq!(events.len(), 4);
        for (index, event) in events.iter().take(3).enumerate() {
            assert!(
                matches!(event, TaskEvent::Progress { processed, total }
                    if *processed == index + 1 && *total == 3)
            );
        }
        assert!(matches!(events[3], TaskEvent::Result(42)));
    }

    #[test]
    fn blocking_wait_skips_progress() {
        let runner = TaskRunner::new();
        let handle = runner.submit(|sink| {
            sink.emit(1, 2);
            sink.emit(2, 2);
            Ok("done")
        });
        assert_eq!(handle.blocking_wait().expect("task succeeds"), "done");
    }

    #[test]
    fn failing_job_delivers_error_terminal() {
        let runner: TaskRunner<()> = TaskRunner::new();
        let handle = runner.submit(|_| Err(EngineError::Unknown("boom".into())));
        assert!(matches!(
            handle.blocking_wait(),
            Err(EngineError::Unknown(msg)) if msg == "boom"
        ));
    }

    #[test]
    fn new_submit_supersedes_pending_task() {
        let runner = TaskRunner::new();
        let first = runner.submit(|sink| {
            thread::sleep(Duration::from_millis(200));
            sink.emit(1, 1);
            Ok(1u32)
        });
        let second = runner.submit(|_| Ok(2u32));

        assert!(matches!(
            first.blocking_wait(),
            Err(EngineError::TaskSuperseded)
        ));
        assert_eq!(second.blocking_wait().expect("second task runs"), 2);
    }

    #[test]
    fn superseded_worker_messages_are_suppressed() {
        let runner = TaskRunner::new();
        let mut first = runner.submit(|sink| {
            thread::sleep(Duration::from_millis(150));
            // All of this happens after the supersede below.
            sink.emit(1, 1);
            Ok(1u32)
        });
        let second = runner.submit(|_| Ok(2u32));
        assert_eq!(second.blocking_wait().expect("second task runs"), 2);

        // The first channel sees the supersede terminal and then closes,
        // with no trailing progress or result from the stale worker.
        let mut events = Vec::new();
        while let Some(event) = first.blocking_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            TaskEvent::Error(EngineError::TaskSuperseded)
        ));
    }

    #[test]
    fn completed_task_is_not_superseded_retroactively() {
        let runner = TaskRunner::new();
        let first = runner.submit(|_| Ok(1u32));
        assert_eq!(first.blocking_wait().expect("first task runs"), 1);

        let second = runner.submit(|_| Ok(2u32));
        assert_eq!(second.blocking_wait().expect("second task runs"), 2);
    }
}
