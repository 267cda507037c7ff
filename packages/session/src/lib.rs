#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-session context and the local report mirror.
//!
//! Identity and notifications are explicit values handed to whoever needs
//! them. [`ReportMirror`] is the read-through cache the query engine runs
//! over: writes update it optimistically and are never rolled back, and
//! write failures are reported through the [`Notifier`].

pub mod auth;
pub mod mirror;
pub mod notify;

pub use auth::{AuthGate, AuthRedirect, AuthUser, Session, SessionState};
pub use mirror::{Divergence, MirrorError, MirrorSnapshot, RefreshSummary, ReportMirror};
pub use notify::{
    Notification, NotificationLevel, NotificationReceiver, Notifier, bounded_notification_channel,
    notification_channel,
};
