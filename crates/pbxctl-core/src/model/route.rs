// ── Call routing domain types ──
//
// Inbound routes map a dialed DID to a local destination; outbound routes
// map a dial pattern to a trunk. Both render into dialplan contexts where
// `(priority, name)` decides the emitted order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use super::record_id::RecordId;
use super::{Record, RecordKind, patch, patch_optional};

/// What an inbound route's `destination` names.
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
pub enum DestinationType {
    #[default]
    Extension,
    Queue,
    Ivr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRoute {
    pub id: RecordId,
    pub name: String,
    /// Dialed number to match. A route without one handles calls that
    /// arrive with no DID.
    pub did: Option<String>,
    pub destination: String,
    pub destination_type: DestinationType,
    pub caller_id_name: Option<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for InboundRoute {
    const KIND: RecordKind = RecordKind::InboundRoute;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRoute {
    pub id: RecordId,
    pub name: String,
    /// Dial pattern, with or without the leading `_`.
    pub pattern: String,
    /// Trunk name the call leaves through.
    pub trunk: String,
    /// Digits added in front of the dialed number after stripping.
    pub prepend: Option<String>,
    /// Digits stripped from the front of the dialed number.
    pub prefix: Option<String>,
    pub caller_id_name: Option<String>,
    pub caller_id_number: Option<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for OutboundRoute {
    const KIND: RecordKind = RecordKind::OutboundRoute;

    fn id(&self) -> RecordId {
        self.id
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateInboundRouteRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    pub destination: String,
    #[serde(default)]
    pub destination_type: DestinationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

impl CreateInboundRouteRequest {
    pub fn into_record(self, now: DateTime<Utc>) -> InboundRoute {
        InboundRoute {
            id: RecordId::new(),
            name: self.name,
            did: self.did.filter(|d| !d.is_empty()),
            destination: self.destination,
            destination_type: self.destination_type,
            caller_id_name: self.caller_id_name,
            priority: self.priority,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInboundRouteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<DestinationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl UpdateInboundRouteRequest {
    pub fn apply(self, route: &mut InboundRoute, now: DateTime<Utc>) {
        patch(&mut route.name, self.name);
        patch_optional(&mut route.did, self.did);
        patch(&mut route.destination, self.destination);
        patch(&mut route.destination_type, self.destination_type);
        patch_optional(&mut route.caller_id_name, self.caller_id_name);
        patch(&mut route.priority, self.priority);
        route.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOutboundRouteRequest {
    pub name: String,
    pub pattern: String,
    pub trunk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_number: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

impl CreateOutboundRouteRequest {
    pub fn into_record(self, now: DateTime<Utc>) -> OutboundRoute {
        OutboundRoute {
            id: RecordId::new(),
            name: self.name,
            pattern: self.pattern,
            trunk: self.trunk,
            prepend: self.prepend.filter(|p| !p.is_empty()),
            prefix: self.prefix.filter(|p| !p.is_empty()),
            caller_id_name: self.caller_id_name,
            caller_id_number: self.caller_id_number,
            priority: self.priority,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOutboundRouteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trunk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl UpdateOutboundRouteRequest {
    pub fn apply(self, route: &mut OutboundRoute, now: DateTime<Utc>) {
        patch(&mut route.name, self.name);
        patch(&mut route.pattern, self.pattern);
        patch(&mut route.trunk, self.trunk);
        patch_optional(&mut route.prepend, self.prepend);
        patch_optional(&mut route.prefix, self.prefix);
        patch_optional(&mut route.caller_id_name, self.caller_id_name);
        patch_optional(&mut route.caller_id_number, self.caller_id_number);
        patch(&mut route.priority, self.priority);
        route.updated_at = now;
    }
}
