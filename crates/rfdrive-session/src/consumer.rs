//! The consumer side of a session binding.

use rfdrive_core::error::Result;
use rfdrive_core::types::{TagData, TagOperation};

/// A party holding (or requesting) the session.
///
/// The session keeps only a [`Weak`](std::sync::Weak) reference to its
/// consumer: the binding never keeps a consumer alive, and a dropped
/// consumer is treated like one that stopped answering.
///
/// All callbacks are synchronous and expected to return quickly; they are
/// invoked from driver tasks, not from the caller's own context.
pub trait SessionConsumer: Send + Sync {
    /// Another party has requested the session.
    ///
    /// Best-effort notification; the consumer may react by calling
    /// `close_connection`, or ignore it and let the requester time out.
    fn connection_attempted(&self);

    /// Periodic liveness probe from the keep-alive service.
    ///
    /// # Errors
    ///
    /// Returning an error terminates the heartbeat for this binding.
    fn keep_alive(&self) -> Result<()>;

    /// Operations the consumer wants executed against a sighted tag.
    ///
    /// Invoked by hardware managers that support per-tag operation
    /// injection during an inventory round; the session core itself never
    /// calls it.
    fn operations_for(&self, tag: &TagData) -> Vec<TagOperation>;
}
