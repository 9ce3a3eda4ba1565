// ── Shared SIP parameter enums ──
//
// String forms match the values the switch accepts in its config files.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

/// Codec set applied when a record does not specify one.
pub const DEFAULT_CODECS: &str = "ulaw,alaw,g722";

/// How DTMF digits are carried.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DtmfMode {
    #[default]
    Rfc2833,
    Info,
    Inband,
    Auto,
}

/// SIP signaling transport.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SipTransport {
    #[default]
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

/// NAT traversal mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NatMode {
    #[default]
    Yes,
    No,
    ForceRport,
    Comedia,
}
