//! # ovenctl-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `CommandChannel`: send commands to ovens, fan out their notifications
//!   - `EventPublisher`: publish session events to observers
//! - Drive one **device session** per oven: the pure `SessionMachine` plus the
//!   task that feeds it acknowledgements and state notifications
//! - Provide the **use-case services**:
//!   - `OvenService`: discover, start/stop cooks, set the probe
//!   - `RecipeService`: look up and compile recipes for a device
//! - Provide **in-process infrastructure** that doesn't need IO: the device
//!   registry, the notification bus and the retry/backoff helper
//!
//! ## Dependency rule
//! Depends on `ovenctl-domain` only (plus `tokio` for channels, timers and
//! tasks). Never imports adapter crates. Adapters depend on *this* crate, not
//! the reverse.

pub mod notification_bus;
pub mod ports;
pub mod registry;
pub mod retry;
pub mod services;
pub mod session;
