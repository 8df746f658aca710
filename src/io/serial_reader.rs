//! Card reader attached over a serial port
//!
//! The reader streams the raw track as ASCII (`;<digits>=<digits>?` plus
//! line endings). Printable bytes are forwarded one character at a time to
//! the same input channel as the keyboard; decoding happens downstream.

use super::InputEvent;
use crate::infra::config::Config;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn};

/// Delay before reopening the port after a read error
const REOPEN_DELAY: Duration = Duration::from_secs(2);

pub struct SerialCardReader {
    device: String,
    baud: u32,
    input_tx: mpsc::Sender<InputEvent>,
}

impl SerialCardReader {
    pub fn new(config: &Config, input_tx: mpsc::Sender<InputEvent>) -> Self {
        Self {
            device: config.reader_device().to_string(),
            baud: config.reader_baud(),
            input_tx,
        }
    }

    /// Bytes worth forwarding to the decoder
    fn track_chars(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
        bytes.iter().copied().filter(u8::is_ascii_graphic).map(char::from)
    }

    /// Read until shutdown, reopening the port after failures
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(device = %self.device, baud = %self.baud, "serial_reader_started");

        loop {
            let port = tokio_serial::new(&self.device, self.baud)
                .timeout(Duration::from_millis(100))
                .open_native_async();

            let mut port = match port {
                Ok(p) => {
                    info!(device = %self.device, "serial_port_opened");
                    p
                }
                Err(e) => {
                    error!(device = %self.device, error = %e, "serial_port_open_failed");
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = tokio::time::sleep(REOPEN_DELAY) => continue,
                    }
                }
            };

            let mut buf = [0u8; 64];
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("serial_reader_shutdown");
                            return;
                        }
                    }
                    read = port.read(&mut buf) => match read {
                        Ok(0) => {}
                        Ok(n) => {
                            for c in Self::track_chars(&buf[..n]) {
                                if self.input_tx.send(InputEvent::ReaderChar(c)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::TimedOut => {}
                        Err(e) => {
                            warn!(device = %self.device, error = %e, "serial_read_error");
                            break;
                        }
                    }
                }
            }

            tokio::time::sleep(REOPEN_DELAY).await;
        }
    }
}
