// ── Extension domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{DEFAULT_CODECS, DtmfMode, NatMode, SipTransport};
use super::record_id::RecordId;
use super::{Record, RecordKind, patch, patch_optional};

/// Dialplan context new extensions place calls from.
pub const DEFAULT_EXTENSION_CONTEXT: &str = "internal";

/// A SIP phone endpoint, keyed by its extension number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub id: RecordId,
    pub extension: String,
    pub name: String,
    pub secret: String,
    pub context: String,
    /// `dynamic` means the phone registers its own address.
    pub host: String,
    pub call_group: Option<String>,
    pub pickup_group: Option<String>,
    /// Voicemail box; renders as the extension number when unset.
    pub mailbox: Option<String>,
    pub email: Option<String>,
    pub dtmf_mode: DtmfMode,
    pub transport: SipTransport,
    pub nat: NatMode,
    pub call_limit: u32,
    pub disallow: String,
    pub allow: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Extension {
    const KIND: RecordKind = RecordKind::Extension;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.extension.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExtensionRequest {
    pub extension: String,
    pub name: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtmf_mode: Option<DtmfMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<SipTransport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disallow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
}

impl CreateExtensionRequest {
    /// Build the stored record, filling documented defaults.
    pub fn into_record(self, now: DateTime<Utc>) -> Extension {
        Extension {
            id: RecordId::new(),
            extension: self.extension,
            name: self.name,
            secret: self.secret,
            context: self
                .context
                .unwrap_or_else(|| DEFAULT_EXTENSION_CONTEXT.into()),
            host: self.host.unwrap_or_else(|| "dynamic".into()),
            call_group: self.call_group,
            pickup_group: self.pickup_group,
            mailbox: self.mailbox,
            email: self.email,
            dtmf_mode: self.dtmf_mode.unwrap_or_default(),
            transport: self.transport.unwrap_or_default(),
            nat: self.nat.unwrap_or_default(),
            call_limit: self.call_limit.unwrap_or(5),
            disallow: self.disallow.unwrap_or_else(|| "all".into()),
            allow: self.allow.unwrap_or_else(|| DEFAULT_CODECS.into()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. Optional text fields are cleared by an empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExtensionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtmf_mode: Option<DtmfMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<SipTransport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disallow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
}

impl UpdateExtensionRequest {
    pub fn apply(self, ext: &mut Extension, now: DateTime<Utc>) {
        patch(&mut ext.extension, self.extension);
        patch(&mut ext.name, self.name);
        patch(&mut ext.secret, self.secret);
        patch(&mut ext.context, self.context);
        patch(&mut ext.host, self.host);
        patch_optional(&mut ext.call_group, self.call_group);
        patch_optional(&mut ext.pickup_group, self.pickup_group);
        patch_optional(&mut ext.mailbox, self.mailbox);
        patch_optional(&mut ext.email, self.email);
        patch(&mut ext.dtmf_mode, self.dtmf_mode);
        patch(&mut ext.transport, self.transport);
        patch(&mut ext.nat, self.nat);
        patch(&mut ext.call_limit, self.call_limit);
        patch(&mut ext.disallow, self.disallow);
        patch(&mut ext.allow, self.allow);
        ext.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateExtensionRequest {
        CreateExtensionRequest {
            extension: "101".into(),
            name: "Alice".into(),
            secret: "s3cret".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_filled_on_create() {
        let ext = request().into_record(Utc::now());
        assert_eq!(ext.context, "internal");
        assert_eq!(ext.host, "dynamic");
        assert_eq!(ext.dtmf_mode, DtmfMode::Rfc2833);
        assert_eq!(ext.transport, SipTransport::Udp);
        assert_eq!(ext.nat, NatMode::Yes);
        assert_eq!(ext.call_limit, 5);
        assert_eq!(ext.disallow, "all");
        assert_eq!(ext.allow, "ulaw,alaw,g722");
    }

    #[test]
    fn update_clears_optional_with_empty_string() {
        let mut ext = CreateExtensionRequest {
            email: Some("alice@example.com".into()),
            ..request()
        }
        .into_record(Utc::now());

        UpdateExtensionRequest {
            email: Some(String::new()),
            call_limit: Some(2),
            ..Default::default()
        }
        .apply(&mut ext, Utc::now());

        assert_eq!(ext.email, None);
        assert_eq!(ext.call_limit, 2);
        assert_eq!(ext.name, "Alice");
    }
}
