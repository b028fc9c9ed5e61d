//! Integration tests for the OBD telemetry stack
//!
//! These tests run the real client against the simulator over loopback TCP:
//! - `e2e_test.rs` - handshake, batch decoding and the full polling pipeline
//! - `reconnect_test.rs` - link loss and recovery through the supervisor
//!
//! ```bash
//! cargo test -p obd-tests
//! ```
//!
//! Helpers shared by both live here.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use obd_core::ValueStore;
use obd_link::{
    Connector, LinkConfig, LinkError, LinkResult, LinkStream, Poller, Supervisor,
    SupervisorConfig, SupervisorHandle, TcpConnector,
};
use obd_sim::{RunningSimulator, SimConfig};

/// Start a simulator on an ephemeral loopback port
pub async fn start_simulator() -> RunningSimulator {
    let config = SimConfig {
        host: "127.0.0.1".into(),
        port: 0,
        tick_ms: 10,
        seed: Some(7),
        ..SimConfig::default()
    };
    obd_sim::start(&config)
        .await
        .expect("simulator failed to start")
}

/// Link config pointing at `addr` with short timeouts
pub fn link_config(addr: SocketAddr) -> LinkConfig {
    let mut config = LinkConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..LinkConfig::default()
    };
    config.timing.connect_timeout_ms = 500;
    config.timing.read_timeout_ms = 500;
    config.timing.retry_delay_ms = 100;
    config.timing.cycle_delay_ms = 5;
    config.timing.slow_every = 3;
    config
}

/// TCP connector that can be switched off to simulate an unreachable adapter
pub struct SwitchableConnector {
    inner: TcpConnector,
    offline: AtomicBool,
    attempts: AtomicUsize,
}

impl SwitchableConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            inner: TcpConnector::new(addr.ip().to_string(), addr.port()),
            offline: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for SwitchableConnector {
    async fn connect(&self, timeout: Duration) -> LinkResult<Box<dyn LinkStream>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(LinkError::Connect {
                endpoint: self.endpoint(),
                reason: "adapter offline".into(),
            });
        }
        self.inner.connect(timeout).await
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

/// Everything a running client consists of
pub struct Client {
    pub store: Arc<ValueStore>,
    pub handle: SupervisorHandle,
}

/// Spawn the full client stack behind `connector`
pub fn spawn_client(connector: Arc<dyn Connector>, config: &LinkConfig) -> Client {
    let store = Arc::new(ValueStore::new());
    let plans = config.build_plans().expect("default channels are valid");
    let poller = Arc::new(Poller::new(plans, store.clone(), &config.timing));
    let handle = Supervisor::new(connector, poller, SupervisorConfig::from(config)).spawn();
    Client { store, handle }
}
