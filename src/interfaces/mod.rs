//! Driving adapters. The CSV adapter feeds wallet seeds and payment commands
//! from files into the service and reports balances.

pub mod csv;
