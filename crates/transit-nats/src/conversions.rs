use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transit_domain::{EventEnvelope, VehicleSnapshot};

/// Queue wire format, one JSON document per message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    pub event_type: String,
    pub timestamp_utc: DateTime<Utc>,
    pub payload: SnapshotMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub bus_id: String,
    pub lat: f64,
    pub lon: f64,
    pub occupancy: u8,
    pub last_updated_utc: Option<DateTime<Utc>>,
    /// Absent in messages from older publishers
    #[serde(default)]
    pub sequence: u64,
}

impl From<&VehicleSnapshot> for SnapshotMessage {
    fn from(snapshot: &VehicleSnapshot) -> Self {
        Self {
            bus_id: snapshot.vehicle_id.clone(),
            lat: snapshot.latitude,
            lon: snapshot.longitude,
            occupancy: snapshot.occupancy,
            last_updated_utc: snapshot.last_updated_utc,
            sequence: snapshot.sequence,
        }
    }
}

impl From<SnapshotMessage> for VehicleSnapshot {
    fn from(message: SnapshotMessage) -> Self {
        Self {
            vehicle_id: message.bus_id,
            latitude: message.lat,
            longitude: message.lon,
            occupancy: message.occupancy,
            last_updated_utc: message.last_updated_utc,
            sequence: message.sequence,
        }
    }
}

impl From<&EventEnvelope> for EnvelopeMessage {
    fn from(envelope: &EventEnvelope) -> Self {
        Self {
            event_type: envelope.event_type.clone(),
            timestamp_utc: envelope.timestamp_utc,
            payload: SnapshotMessage::from(&envelope.payload),
        }
    }
}

impl From<EnvelopeMessage> for EventEnvelope {
    fn from(message: EnvelopeMessage) -> Self {
        Self {
            event_type: message.event_type,
            timestamp_utc: message.timestamp_utc,
            payload: message.payload.into(),
        }
    }
}

pub fn encode_envelope(envelope: &EventEnvelope) -> Result<Vec<u8>> {
    serde_json::to_vec(&EnvelopeMessage::from(envelope)).context("Failed to serialize envelope")
}

pub fn decode_envelope(payload: &[u8]) -> Result<EventEnvelope> {
    let message: EnvelopeMessage =
        serde_json::from_slice(payload).context("Failed to deserialize envelope")?;
    Ok(message.into())
}
