//! Privileged side of the shell.
//!
//! This module owns the job lifecycle (engine launch and supervision) and the
//! result save flow. The presentation layer reaches it only through the
//! [`Bridge`](crate::bridge::Bridge), which [`serve_bridge`] answers.

mod controller;
mod jobs;
mod save;

pub(crate) use controller::serve_bridge;
pub(crate) use jobs::Orchestrator;
pub(crate) use save::{ChannelPrompt, FixedDestination};

#[cfg(all(test, unix))]
pub(crate) use jobs::tests::{checkout_with_engine, COPYING_ENGINE, FAILING_ENGINE};
