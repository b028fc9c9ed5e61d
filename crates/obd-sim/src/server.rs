//! ELM327 protocol server
//!
//! Accepts TCP clients and answers `\r`-terminated commands from the shared
//! vehicle state. The physics task is the only writer of that state; each
//! connection takes a read lock just long enough to build one reply.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::physics::{PhysicsModel, VehicleState};
use crate::responder::{respond, REPLY_TERMINATOR};

pub type SharedState = Arc<RwLock<VehicleState>>;

type Connections = Arc<Mutex<Vec<JoinHandle<()>>>>;

const COMMAND_TERMINATOR: u8 = b'\r';
/// Longer lines are answered with `?` and discarded up to the next terminator
const MAX_COMMAND_LEN: u64 = 64;
/// Pause after a failed accept before accepting again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Answer commands on one stream until the peer closes it
pub async fn serve_connection<S>(stream: S, state: SharedState) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read, mut write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);
    let mut line = Vec::new();
    let mut discarding = false;

    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_COMMAND_LEN)
            .read_until(COMMAND_TERMINATOR, &mut line)
            .await?;
        if n == 0 {
            return Ok(());
        }

        if n as u64 == MAX_COMMAND_LEN && line.last() != Some(&COMMAND_TERMINATOR) {
            if !discarding {
                debug!(limit = MAX_COMMAND_LEN, "Command too long");
                write.write_all(format!("?{}", REPLY_TERMINATOR).as_bytes()).await?;
                write.flush().await?;
            }
            discarding = true;
            continue;
        }
        if discarding {
            // tail of an overlong line
            discarding = false;
            continue;
        }

        let command = String::from_utf8_lossy(&line);
        let reply = {
            let state = state.read();
            respond(&command, &state)
        };

        if let Some(reply) = reply {
            debug!(command = %command.trim(), "Command");
            write.write_all(reply.as_bytes()).await?;
            write.flush().await?;
        }
    }
}

/// Tick the model every `tick` and publish a copy of its state
pub fn spawn_physics(mut model: PhysicsModel, state: SharedState, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            for change in model.tick(started.elapsed()) {
                info!(from = %change.from, to = %change.to, at = ?change.at, "Scenario changed");
            }
            *state.write() = model.state().clone();
        }
    })
}

pub struct ProtocolServer {
    listener: TcpListener,
    state: SharedState,
    connections: Connections,
}

impl ProtocolServer {
    pub async fn bind(addr: &str, state: SharedState) -> SimResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| SimError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self {
            listener,
            state,
            connections: Arc::default(),
        })
    }

    pub fn local_addr(&self) -> SimResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients forever, one task per connection
    pub async fn run(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, error = %e, "Could not set TCP_NODELAY");
            }
            info!(%peer, "Client connected");

            let state = self.state.clone();
            let task = tokio::spawn(async move {
                match serve_connection(stream, state).await {
                    Ok(()) => info!(%peer, "Client disconnected"),
                    Err(e) => warn!(%peer, error = %e, "Client connection failed"),
                }
            });

            let mut connections = self.connections.lock();
            connections.retain(|c| !c.is_finished());
            connections.push(task);
        }
    }
}

/// A simulator running on background tasks; stops when dropped
pub struct RunningSimulator {
    addr: SocketAddr,
    state: SharedState,
    connections: Connections,
    tasks: Vec<JoinHandle<()>>,
}

/// Bind the server and start the physics and accept tasks
pub async fn start(config: &SimConfig) -> SimResult<RunningSimulator> {
    config.validate()?;

    let model = PhysicsModel::new(config.physics(), config.start_scenario, config.seed);
    let state: SharedState = Arc::new(RwLock::new(model.state().clone()));

    let server = ProtocolServer::bind(&config.listen_addr(), state.clone()).await?;
    let addr = server.local_addr()?;
    let connections = server.connections.clone();

    let physics = spawn_physics(model, state.clone(), config.tick());
    let accept = tokio::spawn(server.run());

    info!(
        %addr,
        tick_ms = config.tick_ms,
        scenario = %config.start_scenario,
        "Simulator listening"
    );

    Ok(RunningSimulator {
        addr,
        state,
        connections,
        tasks: vec![physics, accept],
    })
}

impl RunningSimulator {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Copy of the current vehicle state
    pub fn state(&self) -> VehicleState {
        self.state.read().clone()
    }

    /// Close every client connection; the listener keeps accepting
    pub fn drop_connections(&self) -> usize {
        let mut connections = self.connections.lock();
        let count = connections.len();
        for connection in connections.drain(..) {
            connection.abort();
        }
        count
    }

    /// Stop the physics and accept tasks and close all clients
    pub fn shutdown(self) {
        info!(addr = %self.addr, "Simulator stopping");
    }
}

impl Drop for RunningSimulator {
    fn drop(&mut self) {
        self.drop_connections();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
