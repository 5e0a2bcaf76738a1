pub mod collector;

pub use collector::{collector_ca, spawn_collector, spawn_tls_collector, unrelated_ca};
