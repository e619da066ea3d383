//! Single-threaded home for a [`PolicySession`].
//!
//! Policy stores are not required to be `Send`, so the session lives on a
//! dedicated thread and async callers hand it closures over a channel.

use log::{debug, error};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use crate::error::{EngineError, EngineResult};
use crate::session::PolicySession;

type Job = Box<dyn FnOnce(&mut PolicySession) + Send>;

pub struct PolicyApartment {
    tx: Option<mpsc::UnboundedSender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl PolicyApartment {
    /// Build the session on a new thread with `factory` and wait until it
    /// is ready.
    pub async fn start<F>(factory: F) -> EngineResult<Self>
    where
        F: FnOnce() -> EngineResult<PolicySession> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<EngineResult<()>>();

        let thread = std::thread::Builder::new()
            .name("policy-session".into())
            .spawn(move || {
                let mut session = match factory() {
                    Ok(session) => {
                        let _ = ready_tx.send(Ok(()));
                        session
                    }
                    Err(e) => {
                        error!("Policy session failed to start: {e}");
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while let Some(job) = rx.blocking_recv() {
                    job(&mut session);
                }
                debug!("Policy session thread exiting");
            })
            .map_err(EngineError::SessionStart)?;

        ready_rx.await.map_err(|_| EngineError::SessionClosed)??;
        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Run `f` against the session and wait for its result.
    pub async fn run<R, F>(&self, f: F) -> EngineResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PolicySession) -> EngineResult<R> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let tx = self.tx.as_ref().ok_or(EngineError::SessionClosed)?;
        tx.send(Box::new(move |session: &mut PolicySession| {
            let _ = reply_tx.send(f(session));
        }))
        .map_err(|_| EngineError::SessionClosed)?;
        reply_rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Close the channel and wait for queued jobs off the async runtime.
    pub async fn shutdown(mut self) -> EngineResult<()> {
        self.tx.take();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                error!("Policy session thread panicked");
                Err(EngineError::SessionClosed)
            }
        }
    }
}

/// Dropping joins the session thread on the current thread, which blocks
/// until queued jobs finish. Async callers should prefer
/// [`PolicyApartment::shutdown`].
impl Drop for PolicyApartment {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Policy session thread panicked");
            }
        }
    }
}
