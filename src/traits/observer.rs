use crate::engine::NodeId;
use crate::events::Event;

/// Post-send hook.
///
/// Called for every event the moment it is sent into a context, together
/// with the node that produced it, before any matching runs. Observers must
/// not block; they run on the sending thread.
pub trait SendObserver: Send + Sync {
    fn on_send(&self, event: &Event, producer: NodeId);
}
