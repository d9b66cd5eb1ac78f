//! Worker side of the protocol: the call-ordering runtime and the orchestrator's handle to it.

pub(crate) mod handle;
pub(crate) mod runtime;
