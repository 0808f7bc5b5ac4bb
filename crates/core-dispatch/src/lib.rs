//! Single-consumer FIFO dispatcher.
//!
//! One dedicated worker thread pops queued jobs and runs them to completion
//! in strict enqueue order. Two enqueue modes: [`Dispatcher::dispatch`]
//! always queues; [`Dispatcher::dispatch_if_idle`] queues only when the
//! queue is empty *and* no job is in flight, silently dropping otherwise;
//! that drop is the rate limit for self-repeating gestures. Handler errors
//! are logged
//! and the worker moves on; a failed job is corrected by the next confirmed
//! observation, never retried here.

use crossbeam_channel::{Sender, unbounded};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct QueueState {
    queued: usize,
    busy: bool,
}

impl QueueState {
    fn idle(&self) -> bool {
        self.queued == 0 && !self.busy
    }
}

pub struct Dispatcher<T: Send + 'static> {
    tx: Option<Sender<T>>,
    state: Arc<Mutex<QueueState>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + fmt::Debug + 'static> Dispatcher<T> {
    /// Spawn the worker thread. `handler` runs each job; its errors are
    /// logged, never propagated.
    pub fn spawn<F>(name: &str, mut handler: F) -> anyhow::Result<Self>
    where
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        let (tx, rx) = unbounded::<T>();
        let state = Arc::new(Mutex::new(QueueState::default()));
        let worker_state = Arc::clone(&state);
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in rx.iter() {
                    {
                        let mut st = worker_state.lock().expect("dispatcher state poisoned");
                        st.queued -= 1;
                        st.busy = true;
                    }
                    debug!(target: "dispatch", job = ?job, "job_started");
                    match handler(job) {
                        Ok(()) => debug!(target: "dispatch", "job_done"),
                        Err(err) => error!(target: "dispatch", %err, "job_failed"),
                    }
                    let mut st = worker_state.lock().expect("dispatcher state poisoned");
                    st.busy = false;
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            state,
            worker: Some(worker),
        })
    }

    /// Unconditional enqueue.
    pub fn dispatch(&self, job: T) {
        let Some(tx) = &self.tx else { return };
        {
            let mut st = self.state.lock().expect("dispatcher state poisoned");
            st.queued += 1;
            debug!(target: "dispatch", job = ?job, queued = st.queued, "job_enqueued");
        }
        let _ = tx.send(job);
    }

    /// Enqueue only when the worker is idle; returns whether the job was
    /// accepted. The idle check and the enqueue happen under one lock so a
    /// concurrent pop cannot slip between them.
    pub fn dispatch_if_idle(&self, job: T) -> bool {
        let Some(tx) = &self.tx else { return false };
        let mut st = self.state.lock().expect("dispatcher state poisoned");
        if !st.idle() {
            debug!(target: "dispatch", job = ?job, "job_skipped_busy");
            return false;
        }
        st.queued += 1;
        debug!(target: "dispatch", job = ?job, "job_enqueued_idle");
        let _ = tx.send(job);
        true
    }

    /// Whether the queue is empty and no job is in flight.
    pub fn is_idle(&self) -> bool {
        self.state.lock().expect("dispatcher state poisoned").idle()
    }
}

impl<T: Send + 'static> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
