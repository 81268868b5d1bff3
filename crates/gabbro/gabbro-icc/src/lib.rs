mod channel;
mod descriptor;
mod error;
mod index;
mod layout;
mod sync;

pub use channel::RequestChannel;
pub use descriptor::{Descriptor, RequestKind};
pub use error::ChannelError;
pub use index::RingConfig;
pub use layout::bytes_for_ring;
