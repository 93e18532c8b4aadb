//! Event contracts and the pub/sub plumbing used to report side effects
//! (directory writes and their failures) independently of pipeline progress.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
