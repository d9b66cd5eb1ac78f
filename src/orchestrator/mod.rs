//! Orchestrator side: shared memory ownership, worker bootstrap and the continuous render loop.

pub(crate) mod bootstrap;
pub(crate) mod opts;
pub(crate) mod publish;
pub(crate) mod render_loop;
pub(crate) mod source;
