//! Demo hub program: echo stdin back to stdout over Bluetooth

use core::task::Poll;

use hub_core::{ready, Clock, Operation, Status};
use hub_drv::bluetooth::{AwaitAdvertiseOrScan, Backend, Bluetooth, PowerOn};
use log::info;

const CHUNK_SIZE: usize = 64;

#[derive(Debug)]
enum Step {
    PoweringOn(PowerOn),
    Advertising,
    Echoing,
}

/// Powers Bluetooth on, advertises, then echoes whatever the host sends
#[derive(Debug)]
pub struct Echo {
    step: Step,
    buf: [u8; CHUNK_SIZE],
    len: usize,
    sent: usize,
}

impl Default for Echo {
    fn default() -> Self {
        Self {
            step: Step::PoweringOn(PowerOn::new(true)),
            buf: [0; CHUNK_SIZE],
            len: 0,
            sent: 0,
        }
    }
}

impl Echo {
    /// Bytes read from stdin but not yet written back
    pub fn backlog(&self) -> &[u8] {
        &self.buf[self.sent..self.len]
    }
}

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for Echo {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        loop {
            match &mut self.step {
                Step::PoweringOn(power) => {
                    ready!(power.poll(bt))?;
                    bt.start_advertising(true)?;
                    self.step = Step::Advertising;
                }
                Step::Advertising => {
                    ready!(AwaitAdvertiseOrScan.poll(bt))?;
                    info!("{} is ready", bt.hub_name());
                    self.step = Step::Echoing;
                }
                Step::Echoing => {
                    if self.sent == self.len {
                        self.len = bt.read_stdin(&mut self.buf);
                        self.sent = 0;
                        if self.len == 0 {
                            return Poll::Pending;
                        }
                    }
                    let written = ready!(bt.tx(&self.buf[self.sent..self.len]))?;
                    self.sent += written;
                }
            }
        }
    }
}
