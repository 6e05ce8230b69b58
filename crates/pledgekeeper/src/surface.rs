//! Notification surface chosen on the command line.

use clap::ValueEnum;
use pledgekeeper_core::{DesktopSurface, LogSurface, Notification, NotificationSurface};

/// Where notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SurfaceKind {
    /// Desktop notifications.
    #[default]
    Desktop,
    /// Log lines only, for headless hosts.
    Log,
}

/// The notification surface the host runs with.
#[derive(Debug, Clone)]
pub enum HostSurface {
    /// Platform notification daemon.
    Desktop(DesktopSurface),
    /// Structured log.
    Log(LogSurface),
}

impl HostSurface {
    /// Builds the surface for `kind`.
    pub fn new(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::Desktop => Self::Desktop(DesktopSurface::new("PledgeKeeper")),
            SurfaceKind::Log => Self::Log(LogSurface),
        }
    }
}

impl NotificationSurface for HostSurface {
    fn show(&self, notification: &Notification) -> pledgekeeper_core::Result<()> {
        match self {
            Self::Desktop(surface) => surface.show(notification),
            Self::Log(surface) => surface.show(notification),
        }
    }
}
