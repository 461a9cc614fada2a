//! `Hearth` Core: message envelope, codecs, payload encryption and actor contracts.

pub mod codec;
pub mod crypto;
pub mod messages;
pub mod traits;

pub use codec::{Codec, CodecError, CodecKind, JsonCodec, MsgPackCodec};
pub use crypto::{CryptoError, Encryptor};
pub use messages::{DeliverArgs, DisconnectArgs, GetIpArgs, Message, Payload, PushArgs, SessionKind};
pub use traits::{Processor, ProcessorContext};
