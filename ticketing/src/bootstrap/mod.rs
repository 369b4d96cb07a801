//! Bootstrap components for application initialization.
//!
//! - **`resources`**: Infrastructure setup (database, payment provider, collaborators)
//! - **`builder`**: Step-by-step construction of the running [`Application`](crate::runtime::Application)

pub mod builder;
pub mod resources;

pub use builder::ApplicationBuilder;
pub use resources::ResourceManager;
