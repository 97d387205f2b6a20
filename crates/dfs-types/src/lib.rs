//! Shared type definitions for the DFS dashboard relay.
//!
//! The dashboard frontend consumes these types through `TypeScript`
//! bindings generated by `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`events`] -- Failure and order events plus the [`HubEvent`] union
//! - [`frame`] -- JSON wire frame for the real-time channel

pub mod events;
pub mod frame;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use events::{FailureEvent, HubEvent, OrderPayload, names};
pub use frame::{Frame, FrameError};
pub use ids::ViewerId;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::ViewerId::export_all();
        let _ = crate::events::FailureEvent::export_all();
        let _ = crate::frame::Frame::export_all();
    }
}
