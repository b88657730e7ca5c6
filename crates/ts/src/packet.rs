use bytes::{BufMut, BytesMut};

use crate::adaptation_field::AdaptationField;
use crate::{Result, TsError};

pub const PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;
pub const HEADER_SIZE: usize = 4;
/// Bytes available after the 4-byte header.
pub const MAX_PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

/// PAT PID (always 0x0000)
pub const PID_PAT: u16 = 0x0000;
/// NULL PID (always 0x1FFF)
pub const PID_NULL: u16 = 0x1FFF;
/// Highest PID value.
pub const PID_MAX: u16 = 0x1FFF;
/// First PID not reserved for PSI/SI tables.
pub const PID_FIRST_ELEMENTARY: u16 = 0x0010;

/// `adaptation_field_control` values.
pub const AFC_PAYLOAD_ONLY: u8 = 0b01;
pub const AFC_ADAPTATION_ONLY: u8 = 0b10;
pub const AFC_ADAPTATION_AND_PAYLOAD: u8 = 0b11;

/// Write the 4-byte packet header.
pub fn write_header(
    buf: &mut BytesMut,
    pid: u16,
    payload_unit_start: bool,
    adaptation_field_control: u8,
    continuity_counter: u8,
) {
    buf.put_u8(SYNC_BYTE);
    let pusi = if payload_unit_start { 0x4000 } else { 0 };
    buf.put_u16(pusi | (pid & PID_MAX));
    buf.put_u8(((adaptation_field_control & 0x03) << 4) | (continuity_counter & 0x0F));
}

/// Borrowed view over one 188-byte packet.
#[derive(Debug, Clone, Copy)]
pub struct TsPacketRef<'a> {
    pub payload_unit_start_indicator: bool,
    pub pid: u16,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    /// Adaptation field bytes after the length byte; empty when absent or zero-length.
    pub adaptation_field: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> TsPacketRef<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() != PACKET_SIZE {
            return Err(TsError::InvalidPacketSize(data.len()));
        }
        if data[0] != SYNC_BYTE {
            return Err(TsError::InvalidSyncByte(data[0]));
        }

        let payload_unit_start_indicator = data[1] & 0x40 != 0;
        let pid = u16::from_be_bytes([data[1], data[2]]) & PID_MAX;
        let adaptation_field_control = (data[3] >> 4) & 0x03;
        let continuity_counter = data[3] & 0x0F;

        let mut offset = HEADER_SIZE;
        let mut adaptation_field: &[u8] = &[];
        if adaptation_field_control & 0b10 != 0 {
            let length = usize::from(data[offset]);
            offset += 1;
            if offset + length > PACKET_SIZE {
                return Err(TsError::InsufficientData {
                    expected: offset + length,
                    actual: PACKET_SIZE,
                });
            }
            adaptation_field = &data[offset..offset + length];
            offset += length;
        }

        let payload: &[u8] = if adaptation_field_control & 0b01 != 0 {
            &data[offset..]
        } else {
            &[]
        };

        Ok(Self {
            payload_unit_start_indicator,
            pid,
            adaptation_field_control,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0b01 != 0
    }

    pub fn adaptation(&self) -> Option<AdaptationField> {
        AdaptationField::parse(self.adaptation_field)
    }

    pub fn has_random_access_indicator(&self) -> bool {
        self.adaptation_field
            .first()
            .is_some_and(|flags| flags & 0x40 != 0)
    }

    /// PSI payload with the pointer field skipped; `None` unless this packet
    /// starts a section.
    pub fn psi_section(&self) -> Option<&'a [u8]> {
        if !self.payload_unit_start_indicator {
            return None;
        }
        let (&pointer, rest) = self.payload.split_first()?;
        rest.get(usize::from(pointer)..)
    }
}

/// Split a buffer into 188-byte packets.
pub fn packets(data: &[u8]) -> impl Iterator<Item = Result<TsPacketRef<'_>>> {
    data.chunks(PACKET_SIZE).map(TsPacketRef::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut buf = BytesMut::new();
        write_header(&mut buf, 0x0100, true, AFC_ADAPTATION_AND_PAYLOAD, 17);
        assert_eq!(buf.as_ref(), &[0x47, 0x41, 0x00, 0x31]);
    }

    #[test]
    fn test_parse_written_packet() {
        let mut buf = BytesMut::new();
        write_header(&mut buf, 0x1000, false, AFC_PAYLOAD_ONLY, 3);
        buf.put_bytes(0xAB, MAX_PAYLOAD_SIZE);

        let packet = TsPacketRef::parse(&buf).unwrap();
        assert_eq!(packet.pid, 0x1000);
        assert!(!packet.payload_unit_start_indicator);
        assert_eq!(packet.continuity_counter, 3);
        assert!(packet.has_payload());
        assert!(packet.adaptation_field.is_empty());
        assert_eq!(packet.payload.len(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_parse_adaptation_only() {
        let mut buf = BytesMut::new();
        write_header(&mut buf, 0x0100, false, AFC_ADAPTATION_ONLY, 0);
        buf.put_u8(183);
        buf.put_u8(0x40);
        buf.put_bytes(0xFF, 182);

        let packet = TsPacketRef::parse(&buf).unwrap();
        assert!(!packet.has_payload());
        assert!(packet.payload.is_empty());
        assert!(packet.has_random_access_indicator());
        assert_eq!(packet.adaptation_field.len(), 183);
    }

    #[test]
    fn test_invalid_packets() {
        let mut data = vec![0u8; PACKET_SIZE];
        assert_eq!(
            TsPacketRef::parse(&data).unwrap_err(),
            TsError::InvalidSyncByte(0)
        );
        data[0] = SYNC_BYTE;
        data[3] = 0x20;
        data[4] = 184;
        assert!(matches!(
            TsPacketRef::parse(&data),
            Err(TsError::InsufficientData { .. })
        ));
        assert_eq!(
            TsPacketRef::parse(&data[..100]).unwrap_err(),
            TsError::InvalidPacketSize(100)
        );
    }

    #[test]
    fn test_psi_section_skips_pointer() {
        let mut buf = BytesMut::new();
        write_header(&mut buf, PID_PAT, true, AFC_PAYLOAD_ONLY, 0);
        buf.put_u8(2);
        buf.put_slice(&[0xEE, 0xEE, 0x00, 0xB0]);
        buf.put_bytes(0xFF, PACKET_SIZE - buf.len());

        let packet = TsPacketRef::parse(&buf).unwrap();
        assert_eq!(&packet.psi_section().unwrap()[..2], &[0x00, 0xB0]);
    }
}
