//! Application layer containing the money-movement orchestration.
//!
//! `MoneyMovementService` drives the authorize/capture flows against the
//! ledger port, `transfer` is the balance-moving primitive both flows share,
//! and `CaptureNotifier` fans committed captures out to the broker.

pub mod config;
pub mod notifier;
pub mod service;
pub mod transfer;
