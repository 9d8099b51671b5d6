//! Sparse Network Coding (SNC) core.
//!
//! Fragments a block of source data into overlapping generations, emits an
//! unbounded stream of random linear combinations over GF(2^k), and
//! reconstructs the source from a sufficient number of such combinations,
//! even after intermediate nodes have recoded, reordered, dropped, or
//! duplicated the stream.

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod generation;
pub mod gf;
pub mod linalg;
pub mod optimize;
pub mod packet;
pub mod precode;
pub mod recoder;
pub mod scheduler;

pub use config::{GroupingKind, Params, PrecodeKind};
pub use decoder::{cbd::CbdDecoder, gg::GgDecoder, oa::OaDecoder, Decoder, ProcessOutcome};
pub use encoder::Encoder;
pub use error::SncError;
pub use packet::{CodedPacket, PacketKind};
pub use recoder::Recoder;
