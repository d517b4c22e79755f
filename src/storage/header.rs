use crate::{
    storage::{VOLUME_FORMAT_VERSION, VOLUME_HEADER_SIZE, VOLUME_MAGIC},
    types::{PAGE_SIZE, VolNo, error::CollaboratorError},
};

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHeader {
    pub magic: [u8; 16],
    pub page_size: u16,
    pub format_version: u8,
    pub volume: VolNo,
    pub page_count: u32,
    pub change_counter: u32,
}

impl VolumeHeader {
    pub fn new(volume: VolNo) -> Self {
        Self {
            magic: *VOLUME_MAGIC,
            page_size: PAGE_SIZE as u16,
            format_version: VOLUME_FORMAT_VERSION,
            volume,
            page_count: 0,
            change_counter: 1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(VOLUME_HEADER_SIZE);

        buffer.extend_from_slice(&self.magic);
        buffer.extend_from_slice(&self.page_size.to_be_bytes());
        buffer.push(self.format_version);
        buffer.extend_from_slice(&self.volume.to_be_bytes());
        buffer.extend_from_slice(&self.page_count.to_be_bytes());
        buffer.extend_from_slice(&self.change_counter.to_be_bytes());

        buffer.resize(VOLUME_HEADER_SIZE, 0);
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CollaboratorError> {
        if bytes.len() < VOLUME_HEADER_SIZE {
            return Err(CollaboratorError::InvalidVolumeHeader {
                reason: "Header too short".to_string(),
            });
        }

        let mut offset = 0;

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&bytes[offset..offset + 16]);
        if &magic != VOLUME_MAGIC {
            return Err(CollaboratorError::InvalidVolumeHeader {
                reason: "Invalid volume magic number".to_string(),
            });
        }
        offset += 16;

        let page_size = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        if page_size != PAGE_SIZE as u16 {
            return Err(CollaboratorError::InvalidVolumeHeader {
                reason: format!("Unsupported page size: {}", page_size),
            });
        }
        offset += 2;

        let format_version = bytes[offset];
        if format_version > VOLUME_FORMAT_VERSION {
            return Err(CollaboratorError::InvalidVolumeHeader {
                reason: format!("Unsupported format version: {}", format_version),
            });
        }
        offset += 1;

        let volume = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;

        let page_count = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        offset += 4;

        let change_counter = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);

        Ok(Self {
            magic,
            page_size,
            format_version,
            volume,
            page_count,
            change_counter,
        })
    }
}
