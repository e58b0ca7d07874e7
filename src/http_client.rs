//! Fire-and-forget HTTP client for the camera control API.
//!
//! Each command opens a new TCP connection, writes a bare `GET` request, gives
//! the camera [`config::COMMAND_SETTLE_MS`] to act on it and closes the socket.
//! Responses are never read.

use core::fmt::{self, Write as _};

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{debug, info, warn};

use crate::camera::Command;
use crate::config;
use crate::traits::{Connection, Connector, TransportError};
use crate::wifi::LinkState;

/// Longest request we ever build (path plus request line and host header)
const MAX_REQUEST_SIZE: usize = 256;

/// Where the camera's control API listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraEndpoint {
    pub ip: [u8; 4],
    pub port: u16,
}

impl CameraEndpoint {
    pub const fn new(ip: [u8; 4], port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for CameraEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.ip[0], self.ip[1], self.ip[2], self.ip[3]
        )
    }
}

/// Why a command did not reach the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// WiFi is not associated; the command was dropped without any I/O
    LinkDown,
    /// Every attempt failed
    Exhausted {
        attempts: u8,
        last: TransportError,
    },
    /// Path too long for the request buffer
    RequestTooLarge,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::LinkDown => f.write_str("wifi link down, command dropped"),
            CommandError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts ({})", attempts, last)
            }
            CommandError::RequestTooLarge => f.write_str("request does not fit the buffer"),
        }
    }
}

/// Build `GET <path> HTTP/1.1\r\nHost: <ip>\r\n\r\n`.
pub fn format_request(
    path: &str,
    endpoint: &CameraEndpoint,
) -> Result<String<MAX_REQUEST_SIZE>, CommandError> {
    let mut request = String::new();
    write!(request, "GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, endpoint)
        .map_err(|_| CommandError::RequestTooLarge)?;
    Ok(request)
}

/// Sends [`Command`]s to the camera with bounded, back-to-back retries.
pub struct CommandClient<'a, C, D> {
    connector: C,
    delay: D,
    link: &'a LinkState,
    endpoint: CameraEndpoint,
    retries: u8,
    settle_ms: u32,
}

impl<'a, C, D> CommandClient<'a, C, D>
where
    C: Connector,
    D: DelayNs,
{
    pub fn new(connector: C, delay: D, link: &'a LinkState, endpoint: CameraEndpoint) -> Self {
        Self {
            connector,
            delay,
            link,
            endpoint,
            retries: config::COMMAND_RETRIES,
            settle_ms: config::COMMAND_SETTLE_MS,
        }
    }

    /// Override the retry bound (extra attempts after the first).
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn endpoint(&self) -> CameraEndpoint {
        self.endpoint
    }

    pub async fn send(&mut self, command: Command) -> Result<(), CommandError> {
        self.send_with_retries(command, self.retries).await
    }

    /// Send `command`, retrying the whole exchange immediately on socket errors.
    ///
    /// At most `retries + 1` attempts are made. The link is checked once up
    /// front; a down link is reported as [`CommandError::LinkDown`] and never
    /// retried.
    pub async fn send_with_retries(
        &mut self,
        command: Command,
        retries: u8,
    ) -> Result<(), CommandError> {
        if !self.link.is_connected() {
            warn!(
                "[HTTP] Can not send GET {} while wifi is not connected",
                command.path
            );
            return Err(CommandError::LinkDown);
        }

        let request = format_request(command.path, &self.endpoint)?;
        debug!("[HTTP] Sending GET {} HTTP/1.1", command.path);

        let mut remaining = retries;
        let mut attempts: u8 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match self.attempt(request.as_bytes()).await {
                Ok(()) => {
                    if attempts > 1 {
                        info!("[HTTP] GET {} succeeded on attempt {}", command.path, attempts);
                    }
                    return Ok(());
                }
                Err(e) if remaining == 0 => {
                    warn!(
                        "[HTTP] GET {} failed after {} attempts: {}",
                        command.path, attempts, e
                    );
                    return Err(CommandError::Exhausted { attempts, last: e });
                }
                Err(e) => {
                    debug!("[HTTP] GET {} attempt {} failed: {}", command.path, attempts, e);
                    remaining -= 1;
                }
            }
        }
    }

    async fn attempt(&mut self, request: &[u8]) -> Result<(), TransportError> {
        let mut connection = self.connector.connect(self.endpoint).await?;
        if let Err(e) = connection.write_all(request).await {
            connection.close().await;
            return Err(e);
        }
        self.delay.delay_ms(self.settle_ms).await;
        connection.close().await;
        Ok(())
    }
}
