//! tezbot-core — the Tezos governance monitor and event dispatch pipeline.
//!
//! # Architecture
//!
//! ```text
//! Service
//!   ├── Listener
//!   │     ├── BlockSource     (live head monitor / history backfill, own task)
//!   │     ├── RecencyCache    (last 4 block identifiers)
//!   │     └── detectors       (ballot, protocol, proposal, summary, winner)
//!   │            │
//!   │            ▼  mpsc<GovernanceEvent>
//!   └── Dispatcher ──► Publisher (debug / twitter / ...)
//! ```
//!
//! Network access goes through the [`ChainService`] trait; `tezbot-rpc`
//! provides the HTTP implementation. The `testing` feature adds
//! `memory::MemoryChain`, an in-memory one for tests.

pub mod cache;
pub mod chain;
pub mod config;
pub mod detect;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod listener;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod publisher;
pub mod service;
pub mod source;
pub mod types;

pub use cache::RecencyCache;
pub use chain::{ChainService, HeadStream};
pub use config::ListenerConfig;
pub use dispatcher::Dispatcher;
pub use error::{ChainError, ListenerError, PublishError};
pub use events::{Ballot, GovernanceEvent, Proposal, ProposalSummary};
pub use listener::{Listener, ListenerHandle, ListenerState};
pub use publisher::Publisher;
pub use service::{Service, ServiceHandle};
pub use source::{BlockSource, HistoryBackfill, LiveMonitor};
pub use types::{Block, BlockRef, PeriodKind, Vote};
