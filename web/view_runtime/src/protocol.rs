use crate::dispatch::{EventKind, EventValue, InboundEvent};
use crate::error::Result;
use crate::node::NodeId;
use crate::patch::{NodeSnapshot, Patch, PatchKind};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;
use tracing::warn;

pub const CLIENT_TO_SERVER_CAP: usize = 65_536;
pub const SERVER_TO_CLIENT_CAP: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ServerEnvelope {
    #[serde(rename = "render")]
    Render {
        sid: String,
        seq: u64,
        nodes: Vec<NodeSnapshot>,
    },

    #[serde(rename = "patch")]
    Patch {
        sid: String,
        seq: u64,
        nodes: Vec<NodeSnapshot>,
    },

    #[serde(rename = "error")]
    Error {
        sid: String,
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ClientEnvelope {
    #[serde(rename = "ready")]
    Ready { sid: String },

    #[serde(rename = "event")]
    Event {
        sid: String,
        node_id: NodeId,
        #[serde(rename = "type")]
        kind: EventKind,
        value: EventValue,
    },
}

impl ClientEnvelope {
    pub fn sid(&self) -> &str {
        match self {
            ClientEnvelope::Ready { sid } | ClientEnvelope::Event { sid, .. } => sid,
        }
    }
}

pub fn patch_envelope(sid: String, patch: Patch) -> ServerEnvelope {
    match patch.kind {
        PatchKind::Full => ServerEnvelope::Render {
            sid,
            seq: patch.seq,
            nodes: patch.nodes,
        },
        PatchKind::Incremental => ServerEnvelope::Patch {
            sid,
            seq: patch.seq,
            nodes: patch.nodes,
        },
    }
}

pub fn error_envelope(
    sid: String,
    code: impl Into<String>,
    message: impl Into<String>,
) -> ServerEnvelope {
    ServerEnvelope::Error {
        sid,
        code: code.into(),
        message: message.into(),
    }
}

pub fn event_envelope(sid: String, event: InboundEvent) -> ClientEnvelope {
    ClientEnvelope::Event {
        sid,
        node_id: event.node_id,
        kind: event.kind,
        value: event.value,
    }
}

pub fn writer_loop(rx: Receiver<ServerEnvelope>, mut writer: impl Write) -> Result<()> {
    for envelope in rx {
        let payload = encode_server_envelope(&envelope)?;
        write_frame(&mut writer, &payload, SERVER_TO_CLIENT_CAP)?;
        writer.flush()?;
    }

    Ok(())
}

/// Reads frames until EOF. Payloads that fail to decode are logged and
/// skipped; framing errors end the loop.
pub fn reader_loop<F>(mut reader: impl Read, mut on_envelope: F) -> io::Result<()>
where
    F: FnMut(ClientEnvelope),
{
    loop {
        match read_frame(&mut reader, CLIENT_TO_SERVER_CAP) {
            Ok(payload) => match decode_client_envelope(&payload) {
                Ok(envelope) => on_envelope(envelope),
                Err(err) => warn!(error = %err, "dropping undecodable client envelope"),
            },
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

pub fn encode_server_envelope(envelope: &ServerEnvelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

pub fn decode_client_envelope(payload: &[u8]) -> Result<ClientEnvelope> {
    Ok(serde_json::from_slice(payload)?)
}

fn check_frame_len(len: usize, max_payload: usize) -> io::Result<()> {
    if len > max_payload {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} > {max_payload}"),
        ));
    }
    Ok(())
}

pub fn read_frame(reader: &mut impl Read, max_payload: usize) -> io::Result<Vec<u8>> {
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    check_frame_len(len, max_payload)?;

    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

pub fn write_frame(writer: &mut impl Write, payload: &[u8], max_payload: usize) -> io::Result<()> {
    check_frame_len(payload.len(), max_payload)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "payload exceeds u32"))?;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}
