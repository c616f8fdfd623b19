pub mod audit;
pub mod detection;
pub mod drift;
pub mod execution;
pub mod recommendation;
pub mod resources;

pub use audit::*;
pub use detection::*;
pub use drift::*;
pub use execution::*;
pub use recommendation::*;
pub use resources::*;
