//! Reconnect supervisor
//!
//! Drives the link through connect, handshake and polling, and back to
//! disconnected on any failure. There is no terminal state: after a fixed
//! delay it simply tries again, forever. Callers never see the errors, only
//! the published [`LinkState`].

use std::sync::Arc;
use std::time::Duration;

use obd_core::LinkState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::client::ElmLink;
use crate::config::LinkConfig;
use crate::connector::Connector;
use crate::error::LinkError;
use crate::poller::Poller;

/// Timeouts and init sequence used for every connection attempt
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry_delay: Duration,
    pub init_commands: Vec<String>,
}

impl From<&LinkConfig> for SupervisorConfig {
    fn from(config: &LinkConfig) -> Self {
        Self {
            connect_timeout: config.timing.connect_timeout(),
            read_timeout: config.timing.read_timeout(),
            retry_delay: config.timing.retry_delay(),
            init_commands: config.init_commands.clone(),
        }
    }
}

pub struct Supervisor {
    connector: Arc<dyn Connector>,
    poller: Arc<Poller>,
    config: SupervisorConfig,
    state: watch::Sender<LinkState>,
}

impl Supervisor {
    pub fn new(connector: Arc<dyn Connector>, poller: Arc<Poller>, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            connector,
            poller,
            config,
            state,
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// Run on a background task
    pub fn spawn(self) -> SupervisorHandle {
        let state = self.subscribe();
        let task = tokio::spawn(async move { self.run().await });
        SupervisorHandle {
            state,
            task: Some(task),
        }
    }

    /// Supervise the link until the task is cancelled
    pub async fn run(&self) {
        let endpoint = self.connector.endpoint();
        info!(%endpoint, retry_delay = ?self.config.retry_delay, "Link supervisor started");

        loop {
            let err = self.session().await;
            warn!(%endpoint, error = %err, "Link faulted");
            self.transition(LinkState::Faulted);
            self.transition(LinkState::Disconnected);
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// One connect → handshake → poll lifecycle, returning what ended it
    async fn session(&self) -> LinkError {
        self.transition(LinkState::Connecting);
        let mut link = match ElmLink::connect(
            self.connector.as_ref(),
            self.config.connect_timeout,
            self.config.read_timeout,
        )
        .await
        {
            Ok(link) => link,
            Err(e) => return e,
        };

        self.transition(LinkState::Handshaking);
        if let Err(e) = link.handshake(&self.config.init_commands).await {
            return e;
        }

        let mut polling = false;
        self.poller
            .run(&mut link, || {
                if !polling {
                    polling = true;
                    self.transition(LinkState::Polling);
                }
            })
            .await
    }

    fn transition(&self, next: LinkState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Link state changed");
        }
    }
}

/// Observer of a spawned supervisor; aborts it when dropped
pub struct SupervisorHandle {
    state: watch::Receiver<LinkState>,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// The only signal exposed past the polling boundary
    pub fn is_polling(&self) -> bool {
        self.state().is_polling()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`, up to `timeout`
    pub async fn wait_until<P>(&self, mut predicate: P, timeout: Duration) -> bool
    where
        P: FnMut(LinkState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut rx = self.state.clone();
        loop {
            if predicate(*rx.borrow_and_update()) {
                return true;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => return false,
            }
        }
    }

    /// Wait for a specific state
    pub async fn wait_for(&self, target: LinkState, timeout: Duration) -> bool {
        self.wait_until(|s| s == target, timeout).await
    }

    /// Stop supervising
    pub fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
