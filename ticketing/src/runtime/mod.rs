//! Background tasks and process lifecycle.
//!
//! - **`sweeper`**: Periodic release of lapsed holds
//! - **`lifecycle`**: HTTP serving and graceful shutdown

pub mod lifecycle;
pub mod sweeper;

pub use lifecycle::Application;
pub use sweeper::ExpirySweeper;
