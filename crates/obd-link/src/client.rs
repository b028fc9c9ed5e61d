//! ELM327 link client
//!
//! Owns one open stream to the adapter. Every exchange is a command terminated
//! by `\r` followed by a reply terminated by the `>` prompt. Reads are bounded
//! by the read timeout; end-of-stream or timeout before the prompt is a
//! transport error.

use std::time::Duration;

use obd_conv::codec::PROMPT;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connector::{Connector, LinkStream};
use crate::error::{LinkError, LinkResult};

const COMMAND_TERMINATOR: u8 = b'\r';
const READ_CHUNK: usize = 512;

/// An open, prompt-framed connection to an ELM327 adapter
pub struct ElmLink {
    stream: Box<dyn LinkStream>,
    read_timeout: Duration,
    /// Bytes read past the last prompt
    pending: Vec<u8>,
    endpoint: String,
}

impl ElmLink {
    /// Connect through `connector` with a bounded connect timeout
    pub async fn connect(
        connector: &dyn Connector,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> LinkResult<Self> {
        let stream = connector.connect(connect_timeout).await?;
        let endpoint = connector.endpoint();
        info!(%endpoint, "Adapter connected");
        Ok(Self::from_stream(stream, read_timeout, endpoint))
    }

    /// Wrap an already-open stream
    pub fn from_stream(
        stream: Box<dyn LinkStream>,
        read_timeout: Duration,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            read_timeout,
            pending: Vec::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run the AT init sequence
    ///
    /// Each command must be answered with a prompt inside the read timeout.
    /// A `?` reply means the adapter did not understand the command; that is
    /// logged but does not abort, since clones differ in what they accept.
    pub async fn handshake(&mut self, commands: &[String]) -> LinkResult<()> {
        for command in commands {
            let reply = self.query(command).await.map_err(|e| LinkError::Handshake {
                command: command.clone(),
                reason: e.to_string(),
            })?;

            let text = String::from_utf8_lossy(&reply);
            if text.contains('?') {
                warn!(%command, "Adapter rejected init command");
            } else {
                debug!(%command, reply = %text.trim_end_matches('>').trim(), "Init command accepted");
            }
        }
        info!(endpoint = %self.endpoint, commands = commands.len(), "Handshake complete");
        Ok(())
    }

    /// Send one command, appending the terminator
    pub async fn send(&mut self, request: &str) -> LinkResult<()> {
        let mut frame = Vec::with_capacity(request.len() + 1);
        frame.extend_from_slice(request.as_bytes());
        frame.push(COMMAND_TERMINATOR);

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Accumulate bytes until the prompt; returns the reply including `>`
    pub async fn receive_until_prompt(&mut self) -> LinkResult<Vec<u8>> {
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == PROMPT) {
                let rest = self.pending.split_off(pos + 1);
                return Ok(std::mem::replace(&mut self.pending, rest));
            }

            let n = tokio::time::timeout_at(deadline, self.stream.read(&mut buf))
                .await
                .map_err(|_| {
                    LinkError::Transport(format!("no prompt within {:?}", self.read_timeout))
                })??;

            if n == 0 {
                return Err(LinkError::Transport("connection closed before prompt".into()));
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Send a command and wait for its reply
    pub async fn query(&mut self, request: &str) -> LinkResult<Vec<u8>> {
        self.send(request).await?;
        self.receive_until_prompt().await
    }
}
