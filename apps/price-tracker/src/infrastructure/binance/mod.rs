//! Binance Ticker Stream Adapter
//!
//! - **codec**: JSON ticker array decoding (`BatchDecoder`)
//! - **messages**: wire types of the `!ticker@arr` stream
//! - **transport**: WebSocket `FeedTransport` implementation

pub mod codec;
pub mod messages;
pub mod transport;

pub use codec::TickerCodec;
pub use messages::{NumericText, TickerMessage};
pub use transport::{DEFAULT_STREAM_URL, WebSocketTransport};
