//! Offline resource cache for WeatherWise
//!
//! A durable, generation-tagged response cache with a background worker.
//! Provider API requests are served network-first with a cache fallback;
//! static assets are served cache-first. On activation every generation but
//! the current one is purged wholesale.

pub mod cache;
pub mod worker;

pub use cache::{CachedResponse, OfflineError, ResourceCache};
pub use worker::{ControlMessage, Worker, WorkerEvent, WorkerState};
