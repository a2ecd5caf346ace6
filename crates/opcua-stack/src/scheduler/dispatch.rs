// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Worker dispatch pool.
//!
//! Units of work are numbered on submission and processed by a fixed set of
//! worker threads pulling from a shared `crossbeam` channel. Results are
//! handed back strictly in submission order: a result that finishes early
//! waits in a reorder buffer until every earlier unit has completed. This
//! keeps the observable processing order identical to running every unit
//! inline on the calling thread.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Called by a worker after it queued a result.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Fixed-size ordered worker pool.
pub struct DispatchPool<I, O> {
    work_tx: Option<Sender<(u64, I)>>,
    result_rx: Receiver<(u64, O)>,
    workers: Vec<JoinHandle<()>>,
    notify: Arc<Mutex<Option<Notify>>>,
    next_seq: u64,
    next_deliver: u64,
    reorder: BTreeMap<u64, O>,
}

impl<I: Send + 'static, O: Send + 'static> DispatchPool<I, O> {
    /// Spawn `workers` threads running `work` on every submitted unit.
    pub fn new<F>(workers: usize, work: F) -> Result<Self>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        if workers == 0 {
            return Err(Error::Config("dispatch pool needs at least one worker".into()));
        }
        let (work_tx, work_rx) = channel::unbounded::<(u64, I)>();
        let (result_tx, result_rx) = channel::unbounded::<(u64, O)>();
        let work = Arc::new(work);
        let notify: Arc<Mutex<Option<Notify>>> = Arc::new(Mutex::new(None));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let work = Arc::clone(&work);
            let notify = Arc::clone(&notify);
            let handle = std::thread::Builder::new()
                .name(format!("opcua-worker-{}", index))
                .spawn(move || {
                    // Exits once the sender side is dropped and the queue drained.
                    while let Ok((seq, item)) = work_rx.recv() {
                        let out = work(item);
                        if result_tx.send((seq, out)).is_err() {
                            break;
                        }
                        if let Some(wake) = notify.lock().as_ref() {
                            wake();
                        }
                    }
                })
                .map_err(Error::IoError)?;
            handles.push(handle);
        }
        log::debug!("[dispatch] started {} workers", workers);

        Ok(Self {
            work_tx: Some(work_tx),
            result_rx,
            workers: handles,
            notify,
            next_seq: 0,
            next_deliver: 0,
            reorder: BTreeMap::new(),
        })
    }

    /// Install a callback run by workers after each result (e.g. a poll waker).
    pub fn set_notify(&self, notify: Notify) {
        *self.notify.lock() = Some(notify);
    }

    /// Queue a unit of work; returns its sequence number.
    pub fn submit(&mut self, item: I) -> Result<u64> {
        let seq = self.next_seq;
        let tx = self
            .work_tx
            .as_ref()
            .ok_or_else(|| Error::InvalidState("dispatch pool shut down".into()))?;
        tx.send((seq, item))
            .map_err(|_| Error::InvalidState("dispatch workers gone".into()))?;
        self.next_seq += 1;
        Ok(seq)
    }

    /// Units submitted but not yet returned by a collect call.
    pub fn pending(&self) -> usize {
        (self.next_seq - self.next_deliver) as usize
    }

    /// Results that are ready, in submission order, without blocking.
    pub fn try_collect(&mut self) -> Vec<O> {
        while let Ok((seq, out)) = self.result_rx.try_recv() {
            self.reorder.insert(seq, out);
        }
        self.release_in_order()
    }

    /// Block until every submitted unit has completed or `timeout` elapses.
    pub fn collect_all(&mut self, timeout: Duration) -> Vec<O> {
        let deadline = Instant::now() + timeout;
        let mut out = self.try_collect();
        while self.pending() > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.result_rx.recv_timeout(left) {
                Ok((seq, result)) => {
                    self.reorder.insert(seq, result);
                    out.extend(self.release_in_order());
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "[dispatch] {} units still pending after {:?}",
                        self.pending(),
                        timeout
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        out
    }

    fn release_in_order(&mut self) -> Vec<O> {
        let mut out = Vec::new();
        while let Some(result) = self.reorder.remove(&self.next_deliver) {
            out.push(result);
            self.next_deliver += 1;
        }
        out
    }

    /// Stop accepting work and join the workers.
    pub fn shutdown(&mut self) {
        self.work_tx = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("[dispatch] worker panicked");
            }
        }
    }
}

impl<I, O> Drop for DispatchPool<I, O> {
    fn drop(&mut self) {
        self.work_tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
