use verso_types::ObjId;

/// Notifications emitted by adapters after durable state changes.
///
/// Observers (metrics, the GC subsystem) subscribe via
/// [`AdapterEventConsumer`]; the adapter does not know who is listening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterEvent {
    /// Objects were durably written. Carries only the ids that were newly
    /// persisted — idempotent re-writes of existing objects do not appear.
    ObjsPersisted { ids: Vec<ObjId> },
    /// A reference changed state.
    ReferenceChanged {
        name: String,
        change: ReferenceChange,
    },
}

/// The kind of reference state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceChange {
    Created { pointer: ObjId },
    PointerUpdated { from: ObjId, to: ObjId },
    Deleted,
    Purged,
}

/// Callback hook for [`AdapterEvent`]s.
///
/// Invoked synchronously after the state change is durable; implementations
/// must be cheap or hand off to their own machinery.
pub trait AdapterEventConsumer: Send + Sync {
    fn accept(&self, event: AdapterEvent);
}

/// Event consumer that discards everything, for callers without observers.
pub struct NoopEventConsumer;

impl AdapterEventConsumer for NoopEventConsumer {
    fn accept(&self, _event: AdapterEvent) {}
}
