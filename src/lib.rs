//! Bridge between a polled aircraft-position feed and an SBS BaseStation
//! consumer.
//!
//! This library provides functionality to:
//! - Poll an aircraft-list JSON feed with failure backoff
//! - Convert aircraft records to BaseStation `MSG,3` lines
//! - Serve the line stream to one TCP consumer at a time
//! - Accumulate a persistent hex→registration / registration→type table
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ FeedClient  │───▶│     SBS     │───▶│  Listener   │
//! │   (HTTP)    │    │ (Converter) │    │ (TCP serve) │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        │                                     │
//!        └─────────────┬───────────────────────┘
//!                      ▼
//!              ┌─────────────┐     ┌─────────────────┐
//!              │   Bridge    │────▶│ ReferenceStore  │
//!              │ (Session)   │     │ (tab files)     │
//!              └─────────────┘     └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sbslink::{
//!     client::{ClientConfig, FeedClient},
//!     server::Listener,
//!     session::{Bridge, SessionConfig},
//!     store::ReferenceStore,
//! };
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FeedClient::new(ClientConfig::new(
//!         "https://feed.example/AircraftList.json".to_string(),
//!     ))?;
//!     let store = ReferenceStore::load(".")?;
//!     let listener = Listener::bind("127.0.0.1:30003".parse()?).await?;
//!
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let mut bridge = Bridge::new(client, store, SessionConfig::default());
//!     bridge.run(listener, shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod sbs;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

pub use client::{CenterFilter, ClientConfig, FeedClient};
pub use server::Listener;
pub use session::{Bridge, FeedSource, SessionConfig};
pub use store::ReferenceStore;
pub use types::{AircraftList, AircraftRecord};
