// ASCII TCP adapter - A3200 ASCII command interface over TCP

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::aerobasic::commands;
use crate::domain::constants::ReturnCode;
use crate::domain::errors::DomainError;
use crate::ports::{CommandRecord, ControllerPort};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

const COMMAND_TERMINATOR: char = '\n';
const RESPONSE_BUFFER_SIZE: usize = 4096;

/// Split a raw response into its return code and data
pub(crate) fn parse_response(raw: &str) -> Result<(ReturnCode, String), DomainError> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let code = chars
        .next()
        .ok_or_else(|| DomainError::Protocol("Empty response from controller".to_string()))?;
    let return_code = ReturnCode::from_char(code).ok_or_else(|| {
        DomainError::Protocol(format!("Could not identify return code '{}'", code))
    })?;
    Ok((return_code, chars.as_str().to_string()))
}

/// TCP client for the A3200 ASCII interface
pub struct AsciiTcpAdapter {
    hostname: String,
    port: u16,
    response_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    history: Mutex<Vec<CommandRecord>>,
}

impl AsciiTcpAdapter {
    pub fn new(hostname: &str, port: u16, response_timeout: Duration) -> Self {
        Self {
            hostname: hostname.to_string(),
            port,
            response_timeout,
            stream: Mutex::new(None),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Send the line of `record` and read one response on an open stream
    async fn exchange(
        &self,
        stream: &mut TcpStream,
        record: &mut CommandRecord,
    ) -> Result<(ReturnCode, String), DomainError> {
        let command = record.command.trim_end().to_string();
        record.mark_sent();
        stream
            .write_all(record.command.as_bytes())
            .await
            .map_err(|e| DomainError::Protocol(format!("Failed to send '{}': {}", command, e)))?;

        let raw = tokio::time::timeout(self.response_timeout, read_response(stream))
            .await
            .map_err(|_| {
                DomainError::Timeout(format!(
                    "No response to '{}' within {} ms",
                    command,
                    self.response_timeout.as_millis()
                ))
            })??;

        let (return_code, data) = parse_response(&raw)?;
        record.mark_received(return_code, &data);
        Ok((return_code, data))
    }
}

/// Command line with its terminator
fn command_line(command: &str) -> String {
    let mut line = command.to_string();
    if !line.ends_with(COMMAND_TERMINATOR) {
        line.push(COMMAND_TERMINATOR);
    }
    line
}

/// Read until the response terminator, the buffer limit or end of stream
async fn read_response(stream: &mut TcpStream) -> Result<String, DomainError> {
    let mut buffer = Vec::with_capacity(RESPONSE_BUFFER_SIZE);
    let mut chunk = [0u8; RESPONSE_BUFFER_SIZE];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| DomainError::Protocol(format!("Failed to read response: {}", e)))?;
        if n == 0 {
            if buffer.is_empty() {
                return Err(DomainError::Protocol(
                    "Connection closed by controller".to_string(),
                ));
            }
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.ends_with(b"\n") || buffer.len() >= RESPONSE_BUFFER_SIZE {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[async_trait]
impl ControllerPort for AsciiTcpAdapter {
    async fn connect(&self) -> Result<(), DomainError> {
        let mut stream = self.stream.lock().await;
        if stream.is_some() {
            return Ok(());
        }
        let address = self.address();
        let connected = tokio::time::timeout(self.response_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| DomainError::Timeout(format!("Connecting to {}", address)))?;
        match connected {
            Ok(s) => {
                info!(%address, "Connected to A3200 controller");
                *stream = Some(s);
                Ok(())
            }
            Err(e) => {
                error!(%address, "Connection to A3200 controller failed");
                Err(DomainError::Device(format!(
                    "Connection to A3200 controller failed ({}): {}",
                    address, e
                )))
            }
        }
    }

    async fn close(&self) -> Result<(), DomainError> {
        let mut stream = self.stream.lock().await;
        if let Some(mut s) = stream.take() {
            let _ = s.shutdown().await;
            debug!(address = %self.address(), "Connection closed");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    async fn send(&self, command: &str) -> Result<String, DomainError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(DomainError::NotConnected)?;

        let mut record = CommandRecord::new(&command_line(command));
        let (return_code, data) = match self.exchange(stream, &mut record).await {
            Ok(response) => response,
            Err(e) => {
                // The stream position is unknown after a failed exchange
                *guard = None;
                record.error = Some(e.to_string());
                error!(address = %self.address(), "{}", record);
                self.history.lock().await.push(record);
                return Err(e);
            }
        };
        debug!("{}", record);

        match return_code {
            ReturnCode::Success => {
                self.history.lock().await.push(record);
                Ok(data)
            }
            ReturnCode::Invalid => {
                self.history.lock().await.push(record);
                Err(DomainError::InvalidSyntax {
                    command: command.trim_end().to_string(),
                })
            }
            ReturnCode::Fault => {
                // ~LASTERROR is asked once, its own fault is not followed
                let mut error_record = CommandRecord::new(&command_line(&commands::last_error()));
                let last_error = self.exchange(stream, &mut error_record).await;
                let reason = match &last_error {
                    Ok((ReturnCode::Success, reason)) => reason.clone(),
                    _ => "Error retrieving last error...".to_string(),
                };
                if let Err(e) = &last_error {
                    error_record.error = Some(e.to_string());
                    *guard = None;
                }
                record.error = Some(reason.clone());
                error!("{}", record);

                let mut history = self.history.lock().await;
                history.push(record);
                history.push(error_record);
                Err(DomainError::ControllerFault {
                    command: command.trim_end().to_string(),
                    reason,
                })
            }
        }
    }

    async fn history(&self) -> Vec<CommandRecord> {
        self.history.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        assert_eq!(
            parse_response("%1.2.3.4\n").unwrap(),
            (ReturnCode::Success, "1.2.3.4".to_string())
        );
        assert_eq!(
            parse_response("!").unwrap(),
            (ReturnCode::Invalid, String::new())
        );
        assert!(matches!(parse_response("?x"), Err(DomainError::Protocol(_))));
        assert!(matches!(parse_response("  \n"), Err(DomainError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_send_without_connection() {
        let adapter = AsciiTcpAdapter::new(DEFAULT_HOST, DEFAULT_PORT, Duration::from_millis(100));
        assert!(!adapter.is_connected().await);
        assert_eq!(
            adapter.send("ENABLE X").await.unwrap_err(),
            DomainError::NotConnected
        );
        adapter.close().await.unwrap();
    }
}
