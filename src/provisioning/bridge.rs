//! Portal task ↔ provisioning controller hand-off.
//!
//! The HTTP task runs on the portal thread and owns no ports.  Anything
//! that touches WiFi or storage becomes a [`PortalCommand`] the
//! controller executes on the main control path, then answers with a
//! [`PortalReply`].  Storage and WiFi therefore keep a single writer
//! while the portal is up.
//!
//! ```text
//!   HTTP task ──PortalCommand──▶ Channel ──▶ controller tick
//!       ▲                                          │
//!       └──────────── Signal<PortalReply> ◀────────┘
//! ```
//!
//! The HTTP server handles one request at a time, so one reply slot is
//! enough.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::portal::{ConnectOutcome, PortalBackend};
use super::{ScanEntry, WifiCredentials};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCommand {
    Scan,
    Connect(WifiCredentials),
    FactoryReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalReply {
    Networks(Vec<ScanEntry>),
    Connect(ConnectOutcome),
    ResetDone,
}

pub struct PortalBridge {
    commands: Channel<CriticalSectionRawMutex, PortalCommand, 2>,
    reply: Signal<CriticalSectionRawMutex, PortalReply>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    connect_reply_sent: AtomicBool,
}

impl PortalBridge {
    pub fn new() -> Self {
        Self {
            commands: Channel::new(),
            reply: Signal::new(),
            stop: Signal::new(),
            connect_reply_sent: AtomicBool::new(false),
        }
    }

    // ── Portal task side ──────────────────────────────────────

    async fn request(&self, command: PortalCommand) -> PortalReply {
        self.reply.reset();
        self.commands.send(command).await;
        self.reply.wait().await
    }

    /// Resolves once the controller asks the portal to shut down.
    pub async fn stopped(&self) {
        self.stop.wait().await;
    }

    /// The HTTP task finished writing a successful `/api/connect` answer.
    pub fn mark_connect_reply_sent(&self) {
        self.connect_reply_sent.store(true, Ordering::Release);
    }

    // ── Controller side ───────────────────────────────────────

    pub fn next_command(&self) -> Option<PortalCommand> {
        self.commands.try_receive().ok()
    }

    pub fn respond(&self, reply: PortalReply) {
        self.reply.signal(reply);
    }

    pub fn connect_reply_sent(&self) -> bool {
        self.connect_reply_sent.load(Ordering::Acquire)
    }

    pub fn shutdown(&self) {
        self.stop.signal(());
    }
}

impl Default for PortalBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalBackend for PortalBridge {
    async fn scan(&self) -> Vec<ScanEntry> {
        match self.request(PortalCommand::Scan).await {
            PortalReply::Networks(list) => list,
            _ => Vec::new(),
        }
    }

    async fn connect(&self, creds: WifiCredentials) -> ConnectOutcome {
        match self.request(PortalCommand::Connect(creds)).await {
            PortalReply::Connect(outcome) => outcome,
            _ => ConnectOutcome::Failed,
        }
    }

    async fn factory_reset(&self) {
        let _ = self.request(PortalCommand::FactoryReset).await;
    }

    fn connect_reply_written(&self) {
        self.mark_connect_reply_sent();
    }
}
