use bytes::{BufMut, BytesMut};

/// Program Clock Reference: 33-bit base @ 90 kHz + 9-bit extension @ 27 MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    pub base: u64,
    pub extension: u16,
}

impl Pcr {
    /// PCR with the given 90 kHz base and no 27 MHz extension.
    pub fn from_90khz(base: u64) -> Self {
        Self {
            base: base & 0x1_FFFF_FFFF,
            extension: 0,
        }
    }

    /// Parse PCR from at least 6 bytes.
    ///
    /// Layout: `[base32..25][base24..17][base16..9][base8..1][base0 | reserved(6) | ext8][ext7..0]`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 6 {
            return None;
        }
        let base = (u64::from(data[0]) << 25)
            | (u64::from(data[1]) << 17)
            | (u64::from(data[2]) << 9)
            | (u64::from(data[3]) << 1)
            | (u64::from(data[4]) >> 7);
        let extension = (u16::from(data[4] & 0x01) << 8) | u16::from(data[5]);
        Some(Self { base, extension })
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let base = self.base & 0x1_FFFF_FFFF;
        let ext = self.extension & 0x1FF;
        [
            (base >> 25) as u8,
            (base >> 17) as u8,
            (base >> 9) as u8,
            (base >> 1) as u8,
            (((base & 0x01) as u8) << 7) | 0x7E | (ext >> 8) as u8,
            ext as u8,
        ]
    }

    /// Full PCR value at 27 MHz resolution.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + u64::from(self.extension)
    }

    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / 27_000_000.0
    }
}

/// The adaptation field fields the muxer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub pcr: Option<Pcr>,
}

impl AdaptationField {
    /// Random-access point carrying a clock reference.
    pub fn random_access_with_pcr(pcr: Pcr) -> Self {
        Self {
            discontinuity_indicator: false,
            random_access_indicator: true,
            pcr: Some(pcr),
        }
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.discontinuity_indicator {
            flags |= 0x80;
        }
        if self.random_access_indicator {
            flags |= 0x40;
        }
        if self.pcr.is_some() {
            flags |= 0x10;
        }
        flags
    }

    /// Bytes taken in the packet, length byte included, before stuffing.
    pub fn encoded_len(&self) -> usize {
        2 + if self.pcr.is_some() { 6 } else { 0 }
    }

    /// Parse from the bytes following the `adaptation_field_length` byte.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&flags, rest) = data.split_first()?;
        let pcr = if flags & 0x10 != 0 {
            Some(Pcr::parse(rest)?)
        } else {
            None
        };
        Some(Self {
            discontinuity_indicator: flags & 0x80 != 0,
            random_access_indicator: flags & 0x40 != 0,
            pcr,
        })
    }
}

/// Write an adaptation field occupying exactly `total_len` bytes (length
/// byte included), padding the tail with `0xFF` stuffing.
///
/// With no field to carry, a one-byte area is a bare zero length and
/// anything larger is a flags byte of zero followed by stuffing.
pub fn write_adaptation_field(
    buf: &mut BytesMut,
    field: Option<&AdaptationField>,
    total_len: usize,
) {
    debug_assert!(total_len >= field.map_or(1, AdaptationField::encoded_len));
    debug_assert!(total_len <= 184);

    let start = buf.len();
    buf.put_u8((total_len - 1) as u8);
    match field {
        Some(field) => {
            buf.put_u8(field.flags());
            if let Some(pcr) = &field.pcr {
                buf.put_slice(&pcr.to_bytes());
            }
        }
        None if total_len >= 2 => buf.put_u8(0x00),
        None => {}
    }
    let written = buf.len() - start;
    buf.put_bytes(0xFF, total_len - written);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcr_round_trip() {
        for base in [0u64, 1, 90_000, 0x1_FFFF_FFFF] {
            let pcr = Pcr::from_90khz(base);
            assert_eq!(Pcr::parse(&pcr.to_bytes()), Some(pcr));
        }
    }

    #[test]
    fn test_pcr_layout_matches_known_bytes() {
        // base 90000, reserved bits set, extension 0
        assert_eq!(
            Pcr::from_90khz(90_000).to_bytes(),
            [0x00, 0x00, 0xAF, 0xC8, 0x7E, 0x00]
        );
        let pcr = Pcr::parse(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(pcr.base, 0x1_FFFF_FFFF);
        assert_eq!(pcr.extension, 0x1FF);
    }

    #[test]
    fn test_pcr_seconds() {
        assert!((Pcr::from_90khz(90_000).as_seconds() - 1.0).abs() < 1e-9);
        assert_eq!(Pcr::from_90khz(1u64 << 34).base, 0);
    }

    #[test]
    fn test_write_field_with_pcr() {
        let field = AdaptationField::random_access_with_pcr(Pcr::from_90khz(90_000));
        let mut buf = BytesMut::new();
        write_adaptation_field(&mut buf, Some(&field), field.encoded_len());
        assert_eq!(
            buf.as_ref(),
            &[0x07, 0x50, 0x00, 0x00, 0xAF, 0xC8, 0x7E, 0x00]
        );
        assert_eq!(AdaptationField::parse(&buf[1..]), Some(field));
    }

    #[test]
    fn test_write_field_with_stuffing() {
        let field = AdaptationField::random_access_with_pcr(Pcr::from_90khz(0));
        let mut buf = BytesMut::new();
        write_adaptation_field(&mut buf, Some(&field), 12);
        assert_eq!(buf.len(), 12);
        assert_eq!(buf[0], 11);
        assert_eq!(&buf[8..], &[0xFF; 4]);
    }

    #[test]
    fn test_write_pure_stuffing() {
        let mut one = BytesMut::new();
        write_adaptation_field(&mut one, None, 1);
        assert_eq!(one.as_ref(), &[0x00]);

        let mut two = BytesMut::new();
        write_adaptation_field(&mut two, None, 2);
        assert_eq!(two.as_ref(), &[0x01, 0x00]);

        let mut five = BytesMut::new();
        write_adaptation_field(&mut five, None, 5);
        assert_eq!(five.as_ref(), &[0x04, 0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_parse_flags_only() {
        let field = AdaptationField::parse(&[0x40]).unwrap();
        assert!(field.random_access_indicator);
        assert!(!field.discontinuity_indicator);
        assert!(field.pcr.is_none());
        assert!(AdaptationField::parse(&[]).is_none());
        // PCR flag without room for the PCR
        assert!(AdaptationField::parse(&[0x10, 0x00]).is_none());
    }
}
