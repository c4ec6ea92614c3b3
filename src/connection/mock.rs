//! Scripted in-memory transport for session tests.

use std::{
    collections::VecDeque,
    io,
    sync::{Mutex, MutexGuard},
};

use tokio::{sync::Notify, time::Instant};

use super::{not_connected, PortSettings, Transport};
use crate::session::LinkError;

enum Step {
    Byte(u8),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct State {
    open: bool,
    inbound: VecDeque<Step>,
    wire: Vec<u8>,
    open_attempts: Vec<Instant>,
    open_failures: usize,
    send_failures: usize,
    closes: usize,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<State>,
    wake: Notify,
}

impl MockTransport {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Queues bytes for the reader.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state().inbound.extend(bytes.iter().copied().map(Step::Byte));
        self.wake.notify_one();
    }

    /// Queues a read failure after the bytes already queued.
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.state().inbound.push_back(Step::Fail(kind));
        self.wake.notify_one();
    }

    /// Makes the next `count` opens fail.
    pub fn fail_opens(&self, count: usize) {
        self.state().open_failures = count;
    }

    /// Makes the next `count` sends fail.
    pub fn fail_sends(&self, count: usize) {
        self.state().send_failures = count;
    }

    /// Everything successfully written so far.
    pub fn wire(&self) -> Vec<u8> {
        self.state().wire.clone()
    }

    pub fn open_attempts(&self) -> Vec<Instant> {
        self.state().open_attempts.clone()
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn pending_inbound(&self) -> usize {
        self.state().inbound.len()
    }
}

impl Transport for MockTransport {
    async fn open(&self, device: &str, _settings: &PortSettings) -> Result<(), LinkError> {
        let mut state = self.state();
        state.open_attempts.push(Instant::now());

        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(LinkError::PortOpen {
                port: device.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
            });
        }

        state.open = true;
        Ok(())
    }

    async fn close(&self) -> io::Result<()> {
        {
            let mut state = self.state();
            state.open = false;
            state.closes += 1;
        }
        self.wake.notify_one();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let step = {
                let mut state = self.state();
                if !state.open {
                    return Err(not_connected());
                }
                state.inbound.pop_front()
            };

            match step {
                Some(Step::Byte(byte)) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                Some(Step::Fail(kind)) => return Err(io::Error::new(kind, "scripted failure")),
                None => self.wake.notified().await,
            }
        }
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        {
            let mut state = self.state();
            if !state.open {
                return Err(not_connected());
            }
            if state.send_failures > 0 {
                state.send_failures -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
            }
        }

        // Byte at a time, yielding in between, so overlapping writers interleave.
        for &byte in bytes {
            self.state().wire.push(byte);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}
