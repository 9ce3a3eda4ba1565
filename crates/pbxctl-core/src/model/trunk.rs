// ── Trunk domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use super::common::{DEFAULT_CODECS, DtmfMode, NatMode, SipTransport};
use super::record_id::RecordId;
use super::{Record, RecordKind, patch, patch_optional};

/// Channel technology of a trunk. Only `sip` trunks render into `sip.conf`.
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
pub enum TrunkKind {
    #[default]
    Sip,
    Pjsip,
    Iax,
}

/// A provider or peer-switch connection, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub id: RecordId,
    pub name: String,
    pub kind: TrunkKind,
    pub host: String,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub context: String,
    pub dtmf_mode: DtmfMode,
    pub transport: SipTransport,
    pub insecure: String,
    pub nat: NatMode,
    pub qualify_freq: u32,
    pub disallow: String,
    pub allow: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Trunk {
    const KIND: RecordKind = RecordKind::Trunk;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTrunkRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TrunkKind>,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtmf_mode: Option<DtmfMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<SipTransport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualify_freq: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disallow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
}

impl CreateTrunkRequest {
    pub fn into_record(self, now: DateTime<Utc>) -> Trunk {
        Trunk {
            id: RecordId::new(),
            name: self.name,
            kind: self.kind.unwrap_or_default(),
            host: self.host,
            username: self.username,
            secret: self.secret,
            context: self.context.unwrap_or_else(|| "from-trunk".into()),
            dtmf_mode: self.dtmf_mode.unwrap_or_default(),
            transport: self.transport.unwrap_or_default(),
            insecure: self.insecure.unwrap_or_else(|| "port,invite".into()),
            nat: self.nat.unwrap_or_default(),
            qualify_freq: self.qualify_freq.unwrap_or(60),
            disallow: self.disallow.unwrap_or_else(|| "all".into()),
            allow: self.allow.unwrap_or_else(|| DEFAULT_CODECS.into()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTrunkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TrunkKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtmf_mode: Option<DtmfMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<SipTransport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualify_freq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disallow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
}

impl UpdateTrunkRequest {
    pub fn apply(self, trunk: &mut Trunk, now: DateTime<Utc>) {
        patch(&mut trunk.name, self.name);
        patch(&mut trunk.kind, self.kind);
        patch(&mut trunk.host, self.host);
        patch_optional(&mut trunk.username, self.username);
        patch_optional(&mut trunk.secret, self.secret);
        patch(&mut trunk.context, self.context);
        patch(&mut trunk.dtmf_mode, self.dtmf_mode);
        patch(&mut trunk.transport, self.transport);
        patch(&mut trunk.insecure, self.insecure);
        patch(&mut trunk.nat, self.nat);
        patch(&mut trunk.qualify_freq, self.qualify_freq);
        patch(&mut trunk.disallow, self.disallow);
        patch(&mut trunk.allow, self.allow);
        trunk.updated_at = now;
    }
}
