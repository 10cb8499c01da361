// Domain models: upstream status records and their typed payload

pub(crate) mod payload;
mod record;
mod server;

pub use payload::{Payload, PayloadValue};
pub use record::{ServerStatus, StatusRecord};
pub use server::{ServerId, Upstream};
