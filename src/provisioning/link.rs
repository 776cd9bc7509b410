//! Station link monitor.
//!
//! The WiFi driver reports progress on its own event context.  Adapters
//! push typed [`NetEvent`]s into a bounded channel; the [`LinkMonitor`],
//! owned by the control path, drains it and keeps the only link state
//! the rest of the firmware looks at:
//!
//! | Event            | Action                                                    |
//! |------------------|-----------------------------------------------------------|
//! | `StaStarted`     | `connect()`                                               |
//! | `StaDisconnected`| clear `connected`; retry while under the limit, else `failed` |
//! | `GotIp`          | set `connected`, clear `failed`, reset the retry counter   |

use std::net::Ipv4Addr;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::ports::WifiPort;

const EVENT_QUEUE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEvent {
    StaStarted,
    StaDisconnected,
    GotIp(Ipv4Addr),
}

/// Driver context → control path.
pub type NetEventQueue = Channel<CriticalSectionRawMutex, NetEvent, EVENT_QUEUE_DEPTH>;

pub fn net_event_queue() -> Arc<NetEventQueue> {
    Arc::new(Channel::new())
}

/// Push from the driver side.  Never blocks; a full queue drops the event.
pub fn publish(queue: &NetEventQueue, event: NetEvent) {
    if queue.try_send(event).is_err() {
        warn!("Link: event queue full, dropped {:?}", event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Pending,
    Connected,
    Failed,
}

pub struct LinkMonitor {
    events: Arc<NetEventQueue>,
    connected: bool,
    failed: bool,
    retries: u8,
    max_retries: u8,
}

impl LinkMonitor {
    pub fn new(events: Arc<NetEventQueue>, max_retries: u8) -> Self {
        Self {
            events,
            connected: false,
            failed: false,
            retries: 0,
            max_retries,
        }
    }

    /// Forget previous outcomes before a fresh connection attempt.
    pub fn clear(&mut self) {
        self.connected = false;
        self.failed = false;
        self.retries = 0;
    }

    /// Drain pending driver events and return the resulting status.
    pub fn pump(&mut self, wifi: &mut impl WifiPort) -> LinkStatus {
        while let Ok(event) = self.events.try_receive() {
            self.handle(event, wifi);
        }
        self.status()
    }

    fn handle(&mut self, event: NetEvent, wifi: &mut impl WifiPort) {
        match event {
            NetEvent::StaStarted => {
                if let Err(e) = wifi.connect() {
                    debug!("Link: connect on start failed ({})", e);
                }
            }
            NetEvent::StaDisconnected => {
                self.connected = false;
                if self.retries < self.max_retries {
                    self.retries += 1;
                    info!(
                        "Link: disconnected, retrying ({}/{})",
                        self.retries, self.max_retries
                    );
                    if let Err(e) = wifi.connect() {
                        debug!("Link: reconnect failed ({})", e);
                    }
                } else {
                    if !self.failed {
                        warn!("Link: WiFi connection failed");
                    }
                    self.failed = true;
                }
            }
            NetEvent::GotIp(ip) => {
                info!("Link: got IP {}", ip);
                self.connected = true;
                self.failed = false;
                self.retries = 0;
            }
        }
    }

    pub fn status(&self) -> LinkStatus {
        if self.connected {
            LinkStatus::Connected
        } else if self.failed {
            LinkStatus::Failed
        } else {
            LinkStatus::Pending
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }
}
