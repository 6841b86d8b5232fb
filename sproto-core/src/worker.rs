//! Worker pool: one dedicated OS thread per worker, each running a
//! `compio` reactor plus an ordered timer list. FSMs never block; they
//! register interest with a worker and get woken by events raised back into
//! their own context.
//!
//! Generalized from "one actor per connection" to "one reactor thread
//! shared by many FSMs," with the timer/task scheduling contract this
//! crate's concurrency model requires added on top.

use crate::context::{Context, Event, FsmId};
use crate::timer::TimerWheel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identifies a task scheduled onto a worker via `schedule_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

enum WorkerMsg {
    Task(TaskId, Box<dyn FnOnce() + Send>),
    CancelTask(TaskId),
    AddTimer {
        owner: FsmId,
        ctx: Arc<Context>,
        delay: Duration,
        reply: flume::Sender<crate::context::TimerId>,
    },
    CancelTimer(crate::context::TimerId),
    Shutdown,
}

/// A handle to a running worker thread. Cloning shares the same underlying
/// channel, so any FSM holding a `WorkerHandle` can schedule work onto it
/// from any thread.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: flume::Sender<WorkerMsg>,
    next_task_id: Arc<AtomicU64>,
}

impl WorkerHandle {
    /// Cross-thread enqueue of a user task; the worker's reactor wakes and
    /// runs it on its next loop iteration.
    pub fn schedule_task(&self, f: impl FnOnce() + Send + 'static) -> TaskId {
        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(WorkerMsg::Task(id, Box::new(f)));
        id
    }

    /// Remove a queued task if it hasn't run yet. Best-effort: if the
    /// worker has already started running it, cancellation has no effect.
    pub fn cancel_task(&self, id: TaskId) {
        let _ = self.tx.send(WorkerMsg::CancelTask(id));
    }

    /// Arm a timer for `owner` within `ctx`, firing in `delay`. Blocks
    /// briefly for the worker to assign the timer id.
    pub fn add_timer(&self, ctx: &Arc<Context>, owner: FsmId, delay: Duration) -> crate::context::TimerId {
        let (reply, rx) = flume::bounded(1);
        let _ = self.tx.send(WorkerMsg::AddTimer {
            owner,
            ctx: ctx.clone(),
            delay,
            reply,
        });
        rx.recv().expect("worker thread dropped without replying")
    }

    /// Cancel a timer. A `TimerStopped` event is always delivered to the
    /// owning FSM — even if the timer had already fired concurrently —
    /// since cancellation is asynchronous relative to the worker thread.
    pub fn cancel_timer(&self, id: crate::context::TimerId) {
        let _ = self.tx.send(WorkerMsg::CancelTimer(id));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerMsg::Shutdown);
    }
}

/// A fixed-size pool of [`Worker`] threads. `next_handle` round-robins
/// across them so callers don't have to track assignment themselves.
pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
    next: Arc<AtomicU64>,
}

impl WorkerPool {
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// The next handle in round-robin order.
    #[must_use]
    pub fn next_handle(&self) -> &WorkerHandle {
        let i = self.next.fetch_add(1, Ordering::Relaxed) as usize % self.handles.len();
        &self.handles[i]
    }

    pub fn shutdown(&self) {
        for h in &self.handles {
            h.shutdown();
        }
    }
}

/// One worker: a dedicated OS thread owning a reactor and a timer wheel.
/// FD registration (`register_fd`/`arm_read`/`arm_write`/`disarm`) is
/// delegated to `compio`'s own reactor via the async tasks scheduled onto
/// this worker — `compio::runtime::spawn` from within a scheduled task is
/// how an FSM arms its own I/O, rather than this struct exposing raw FD
/// primitives directly.
pub struct Worker {
    rx: flume::Receiver<WorkerMsg>,
}

struct PendingTimer {
    ctx: Arc<Context>,
    owner: FsmId,
}

impl Worker {
    /// Spawn a single worker thread, returning a handle to schedule work
    /// onto it.
    #[must_use]
    pub fn spawn() -> WorkerHandle {
        let (tx, rx) = flume::unbounded();
        let worker = Self { rx };
        std::thread::Builder::new()
            .name("sproto-worker".to_string())
            .spawn(move || worker.run())
            .expect("failed to spawn worker thread");
        WorkerHandle {
            tx,
            next_task_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Spawn a pool of `count` worker threads, round-robining
    /// `schedule_task`/`add_timer` calls across them. `count` defaults to
    /// `num_cpus::get()` when `None`, the usual process/context-group
    /// startup convention.
    #[must_use]
    pub fn spawn_pool(count: Option<usize>) -> WorkerPool {
        let count = count.unwrap_or_else(num_cpus::get).max(1);
        WorkerPool {
            handles: (0..count).map(|_| Self::spawn()).collect(),
            next: Arc::new(AtomicU64::new(0)),
        }
    }

    fn run(self) {
        let runtime = compio::runtime::Runtime::new().expect("failed to start compio runtime");
        let mut timers = TimerWheel::new();
        let mut owners: std::collections::HashMap<crate::context::TimerId, PendingTimer> =
            std::collections::HashMap::new();
        let mut cancelled_tasks = std::collections::HashSet::new();

        runtime.block_on(async {
            loop {
                // 1. Compute next timer delay (None = wait indefinitely for a message).
                let delay = timers.next_delay();

                // 2. Wait for a scheduled message up to that delay.
                let msg = match delay {
                    Some(d) => match self.rx.recv_timeout(d) {
                        Ok(m) => Some(m),
                        Err(flume::RecvTimeoutError::Timeout) => None,
                        Err(flume::RecvTimeoutError::Disconnected) => break,
                    },
                    None => match self.rx.recv() {
                        Ok(m) => Some(m),
                        Err(_) => break,
                    },
                };

                // 3. Handle the message, if any arrived before the deadline.
                match msg {
                    Some(WorkerMsg::Task(id, f)) => {
                        if !cancelled_tasks.remove(&id) {
                            f();
                        }
                    }
                    Some(WorkerMsg::CancelTask(id)) => {
                        cancelled_tasks.insert(id);
                    }
                    Some(WorkerMsg::AddTimer { owner, ctx, delay, reply }) => {
                        let id = timers.add(owner, delay);
                        owners.insert(id, PendingTimer { ctx, owner });
                        let _ = reply.send(id);
                    }
                    Some(WorkerMsg::CancelTimer(id)) => {
                        timers.cancel(id);
                    }
                    Some(WorkerMsg::Shutdown) | None => {}
                }

                if matches!(msg, Some(WorkerMsg::Shutdown)) {
                    break;
                }

                // 5. Deliver every expired timer.
                for (owner, id, fired) in timers.expired() {
                    if let Some(pending) = owners.remove(&id) {
                        debug_assert_eq!(pending.owner, owner);
                        let event = if fired {
                            Event::Timeout(id)
                        } else {
                            Event::TimerStopped(id)
                        };
                        pending.ctx.enter(|c| c.raise(owner, event));
                    }
                }

                // Cancelled timers that haven't reached their deadline yet
                // still owe the owner a `TimerStopped`.
                for (owner, id) in timers.drain_cancelled() {
                    if let Some(pending) = owners.remove(&id) {
                        debug_assert_eq!(pending.owner, owner);
                        pending.ctx.enter(|c| c.raise(owner, Event::TimerStopped(id)));
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn pool_round_robins_across_workers() {
        let pool = Worker::spawn_pool(Some(3));
        assert_eq!(pool.len(), 3);
        let a = pool.next_handle() as *const WorkerHandle;
        let b = pool.next_handle() as *const WorkerHandle;
        let c = pool.next_handle() as *const WorkerHandle;
        let d = pool.next_handle() as *const WorkerHandle;
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(a, d);
        pool.shutdown();
    }

    struct Recorder(Arc<Mutex<Vec<Event>>>);
    impl crate::context::FsmHandler for Recorder {
        fn handle(&mut self, _ctx: &Arc<Context>, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn scheduled_task_runs_on_worker_thread() {
        let handle = Worker::spawn();
        let (tx, rx) = flume::bounded(1);
        handle.schedule_task(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);
        handle.shutdown();
    }

    #[test]
    fn timer_fires_and_delivers_timeout_event() {
        let handle = Worker::spawn();
        let ctx = Arc::new(Context::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = ctx.register(Box::new(Recorder(log.clone())));

        handle.add_timer(&ctx, id, Duration::from_millis(30));

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(matches!(log.lock().unwrap()[0], Event::Timeout(_)));
        handle.shutdown();
    }

    #[test]
    fn cancelled_timer_reports_stopped_not_timeout() {
        let handle = Worker::spawn();
        let ctx = Arc::new(Context::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = ctx.register(Box::new(Recorder(log.clone())));

        let timer_id = handle.add_timer(&ctx, id, Duration::from_secs(30));
        handle.cancel_timer(timer_id);

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(matches!(log.lock().unwrap()[0], Event::TimerStopped(_)));
        handle.shutdown();
    }
}
