use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Operator asked for a brief (fresh click or retry).
    Submit {
        request: crate::GenerationRequest,
        at: SystemTime,
    },
    /// A remote generation call resolved or rejected.
    Settled {
        ticket: crate::JobTicket,
        item_id: crate::ItemId,
        outcome: crate::JobOutcome,
        at: SystemTime,
    },
    /// Forget completed and failed ids.
    Cleanup,
    /// Drop all bookkeeping, in-flight calls included.
    Reset,
}
