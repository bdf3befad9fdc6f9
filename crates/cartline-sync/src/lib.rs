//! # cartline-sync: Cart Engine for Cartline
//!
//! Keeps the local cart replica responsive and consistent with the backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Cart Session                                   │
//! │                                                                         │
//! │   UI observers                                                          │
//! │       │  add_item / remove_item / ...          ▲ CartSnapshot           │
//! │       ▼                                        │                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       CartEngine                                 │  │
//! │  │                                                                  │  │
//! │  │  confirmed ──► replay(pending) ──► current                       │  │
//! │  │                     │                                            │  │
//! │  │                     ▼ FIFO, one call in flight                   │  │
//! │  │               worker task                                        │  │
//! │  └─────────────────────┬────────────────────────────────────────────┘  │
//! │                        │                                                │
//! │                        ▼                                                │
//! │              Arc<dyn CartGateway>  ──►  HttpCartGateway ──► REST API   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - The local total always equals the sum of items and add-ons
//! - A failed edit is undone and reported to both the caller and observers
//! - Edits reach the backend in the order they were made, one at a time
//! - The backend's answer replaces the local cart wholesale

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod http;
pub mod observer;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CartConfig, EngineSettings, GatewaySettings};
pub use engine::{CartEngine, OpPhase, PendingOperation};
pub use error::{SyncError, SyncResult};
pub use gateway::CartGateway;
pub use http::HttpCartGateway;
pub use observer::{CartObserver, CartSnapshot, ObserverRegistry, SnapshotPhase, SubscriptionId};
