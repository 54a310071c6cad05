//! Time-bounded buffer holding notifications between scrapes
//! (passthrough mode).

use std::time::{Duration, Instant};

use gnmipulse_client::gnmi::Notification;

const BUF_INITIAL_CAP: usize = 2048;
const SCRAPE_DELAY_MULTIPLIER: u32 = 2;

/// Ordered notification queue with a wall-clock deadline.
///
/// When the deadline is missed once (no scrape showed up in twice the
/// scrape interval) the buffer goes starved: it drops its content and
/// silently discards arrivals until the next checkout re-arms it.
#[derive(Debug)]
pub struct UBuffer {
    buf: Vec<Notification>,
    scrape_interval: Duration,
    deadline: Instant,
    starved: bool,
}

impl UBuffer {
    pub fn new(scrape_interval: Duration) -> Self {
        Self {
            buf: Vec::with_capacity(BUF_INITIAL_CAP),
            scrape_interval,
            deadline: Instant::now() + scrape_interval * SCRAPE_DELAY_MULTIPLIER,
            starved: false,
        }
    }

    /// Appends a notification unless the buffer is starved. A first
    /// post-deadline arrival flips the buffer into starved state.
    pub fn add(&mut self, nf: Notification) {
        if self.starved {
            return;
        }
        if Instant::now() > self.deadline {
            self.starved = true;
            self.clear();
            return;
        }
        self.buf.push(nf);
    }

    /// Returns the buffered notifications sorted by ascending timestamp,
    /// clears the buffer and re-arms the deadline.
    pub fn checkout(&mut self) -> Vec<Notification> {
        let mut out = std::mem::replace(&mut self.buf, Vec::with_capacity(BUF_INITIAL_CAP));
        out.sort_by_key(|nf| nf.timestamp);
        self.starved = false;
        self.deadline = Instant::now() + self.scrape_interval * SCRAPE_DELAY_MULTIPLIER;
        out
    }

    pub fn clear(&mut self) {
        self.buf = Vec::with_capacity(BUF_INITIAL_CAP);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buf.len()
    }
}
