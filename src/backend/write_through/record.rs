//! Write-through record definitions
//!
//! A record is framed as `[crc32 (4, LE)][payload len (4, LE)][payload]`.

use serde::{Deserialize, Serialize};

use crate::error::{PclError, Result};

/// Frame header size: CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 8;

/// Operations stored in a write-through log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Store a value
    Put { key: String, value: Vec<u8> },

    /// Remove a key
    Delete { key: String },
}

impl Record {
    pub fn key(&self) -> &str {
        match self {
            Record::Put { key, .. } | Record::Delete { key } => key,
        }
    }

    /// Serialize into a complete frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);

        Ok(frame)
    }

    /// Split a frame header into (crc, payload length)
    pub fn parse_header(header: &[u8]) -> (u32, usize) {
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        crc.copy_from_slice(&header[0..4]);
        len.copy_from_slice(&header[4..8]);
        (u32::from_le_bytes(crc), u32::from_le_bytes(len) as usize)
    }

    /// Verify and deserialize a payload
    pub fn decode(expected_crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != expected_crc {
            return Err(PclError::Corruption(format!(
                "record CRC mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual
            )));
        }

        Ok(bincode::deserialize(payload)?)
    }
}
