//! Named-event fan-out to application listeners.

mod registry;

pub use registry::{Listener, ListenerRegistry, Unsubscribe};
