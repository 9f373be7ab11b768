//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use backstop::OperationError;
use futures::future::{BoxFuture, FutureExt};
use tokio::time::Instant;

pub type Outcome = Result<&'static str, OperationError>;

/// Operation replaying a fixed script of outcomes; the last entry repeats.
#[derive(Clone)]
pub struct ScriptedOperation {
    script: Arc<Mutex<VecDeque<Result<&'static str, OperationError>>>>,
    calls: Arc<AtomicU32>,
    call_times: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedOperation {
    pub fn new(script: Vec<Result<&'static str, OperationError>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one outcome");
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(AtomicU32::new(0)),
            call_times: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(outcome: Result<&'static str, OperationError>) -> Self {
        Self::new(vec![outcome])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    /// The zero-argument operation handed to the coordinator.
    pub fn operation(&self) -> impl Fn() -> BoxFuture<'static, Outcome> + Send + Sync + 'static {
        let this = self.clone();
        move || {
            let this = this.clone();
            async move {
                this.calls.fetch_add(1, Ordering::SeqCst);
                this.call_times.lock().unwrap().push(Instant::now());
                let mut script = this.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    script.front().cloned().unwrap()
                }
            }
            .boxed()
        }
    }
}

/// Records fetch instants for a refresh channel.
#[derive(Clone, Default)]
pub struct FetchLog {
    fires: Arc<Mutex<Vec<Instant>>>,
}

impl FetchLog {
    pub fn fetch(&self) -> impl FnOnce() -> futures::future::Ready<()> + Send + 'static {
        let fires = self.fires.clone();
        move || {
            fires.lock().unwrap().push(Instant::now());
            futures::future::ready(())
        }
    }

    pub fn fires(&self) -> Vec<Instant> {
        self.fires.lock().unwrap().clone()
    }
}
