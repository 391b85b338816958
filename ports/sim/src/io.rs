//! Terminal streams for the simulated Bluetooth host

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use hub_core::{Error, HubResult};
use hub_drv::bluetooth::{InputStream, OutputSink};
use hub_hal::HalError;
use log::{debug, warn};

const READ_CHUNK_SIZE: usize = 256;

/// Non-blocking view of a blocking reader.
///
/// A reader thread does the blocking reads and hands chunks over a
/// channel, asking the scheduler for a poll after each one.
#[derive(Debug)]
pub struct StdinStream {
    chunks: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    closed: bool,
}

impl StdinStream {
    /// Stream of the process's standard input
    pub fn stdin() -> Self {
        Self::spawn(io::stdin())
    }

    pub fn spawn<R: Read + Send + 'static>(mut reader: R) -> Self {
        let (sender, chunks) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(count) => {
                        if sender.send(buf[..count].to_vec()).is_err() {
                            break;
                        }
                        hub_os::request_poll();
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!("stdin: {}", err);
                        break;
                    }
                }
            }
            debug!("stdin: closed");
        });

        Self {
            chunks,
            pending: Vec::new(),
            closed: false,
        }
    }

    /// True once the reader hit end of input and everything was consumed
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }
}

impl InputStream for StdinStream {
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, HalError> {
        if self.pending.is_empty() {
            match self.chunks.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return Err(nb::Error::WouldBlock),
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return Err(nb::Error::WouldBlock);
                }
            }
        }

        let count = buf.len().min(self.pending.len());
        buf[..count].copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        Ok(count)
    }
}

/// Hub stdout written to a host writer, flushed after each packet
#[derive(Debug)]
pub struct StdoutSink<W = io::Stdout> {
    writer: W,
}

impl StdoutSink {
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> OutputSink for StdoutSink<W> {
    fn write(&mut self, data: &[u8]) -> HubResult<()> {
        self.writer
            .write_all(data)
            .and_then(|()| self.writer.flush())
            .map_err(|err| {
                warn!("stdout: {}", err);
                Error::Io
            })
    }
}
