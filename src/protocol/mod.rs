//! RTM wire protocol
//!
//! One JSON document per websocket frame. Outbound requests carry an
//! `action`, a `body` and, for subscribe/unsubscribe, a correlation `id`
//! that the server echoes back in its `*/ok` or `*/error` response.
//!
//! ```text
//! Client                                         Server
//!   |-- rtm/subscribe {id: 7, channel: "c"} ------->|
//!   |<----------------------- rtm/subscribe/ok {id: 7}
//!   |<-------- rtm/subscription/data {messages: [..]}
//!   |-- rtm/unsubscribe {id: 8} ------------------->|
//!   |<--------------------- rtm/unsubscribe/ok {id: 8}
//! ```

pub mod codec;
pub mod constants;

pub use codec::{
    decode, encode_publish, encode_subscribe, encode_unsubscribe, Action, Inbound,
};
