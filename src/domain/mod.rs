//! Domain layer: value objects, entities, events and the ports the
//! application drives.

pub mod account;
pub mod event;
pub mod payment;
pub mod ports;
pub mod transaction;
