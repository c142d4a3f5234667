//! Connection pumps: read, write and keepalive loops.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
