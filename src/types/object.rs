use serde::{Deserialize, Serialize};

use crate::types::{OBJECT_ALIGNMENT, OBJECT_HEADER_SIZE, error::StorageError};

/// Property flags carried in the object header.
pub mod properties {
    pub const CLEAR: u16 = 0x0000;
    /// Body is the root of a large object kept outside the page.
    pub const LARGE_OBJECT: u16 = 0x0001;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub properties: u16,
    pub tag: u16,
    pub length: u32, // Declared body length, before alignment
}

impl ObjectHeader {
    pub fn new(properties: u16, length: u32) -> Self {
        Self {
            properties,
            tag: 0,
            length,
        }
    }

    pub fn is_large(&self) -> bool {
        self.properties & properties::LARGE_OBJECT != 0
    }

    pub fn aligned_length(&self) -> usize {
        aligned_length(self.length as usize)
    }

    /// Bytes the object occupies in the data area, header included.
    pub fn stored_size(&self) -> usize {
        OBJECT_HEADER_SIZE + self.aligned_length()
    }

    pub fn encode(&self) -> [u8; OBJECT_HEADER_SIZE] {
        let mut buffer = [0u8; OBJECT_HEADER_SIZE];
        buffer[0..2].copy_from_slice(&self.properties.to_le_bytes());
        buffer[2..4].copy_from_slice(&self.tag.to_le_bytes());
        buffer[4..8].copy_from_slice(&self.length.to_le_bytes());
        buffer
    }

    pub fn decode(bytes: &[u8; OBJECT_HEADER_SIZE]) -> Self {
        Self {
            properties: u16::from_le_bytes([bytes[0], bytes[1]]),
            tag: u16::from_le_bytes([bytes[2], bytes[3]]),
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let raw: &[u8; OBJECT_HEADER_SIZE] = bytes
            .get(..OBJECT_HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| StorageError::bad_object("object header truncated"))?;
        Ok(Self::decode(raw))
    }
}

pub fn aligned_length(len: usize) -> usize {
    (len + OBJECT_ALIGNMENT - 1) & !(OBJECT_ALIGNMENT - 1)
}
