// pbxctl-ami: Async client for the Asterisk Manager Interface (AMI)
//
// One long-lived session per client handle: login handshake, action/response
// correlation by ActionID, unsolicited event broadcast, and reconnection with
// capped exponential backoff.

pub mod backoff;
pub mod client;
pub mod codec;
pub mod connector;
pub mod error;
pub mod message;
pub mod sleep;

pub use backoff::ReconnectPolicy;
pub use client::{ConnectionState, EventListener, ListenerError, ManagerClient, ManagerConfig};
pub use codec::{AmiCodec, Frame};
pub use connector::{AsyncStream, BoxedStream, Connector, TcpConnector};
pub use error::Error;
pub use message::{Action, ActionResponse, ManagerEvent, ManagerMessage};
pub use sleep::{Sleeper, TokioSleeper, TrackingSleeper};
