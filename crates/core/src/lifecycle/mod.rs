pub mod engine;
pub mod states;

pub use engine::{LifecycleEngine, TransitionError};
pub use states::{LifecycleAction, LifecycleEvent, TransitionOutcome};
