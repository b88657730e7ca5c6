//! Reads a single-program transport stream back into its tables and PES
//! packets, checking sync bytes, section CRCs and continuity counters on the
//! way. Used to verify muxer output.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::adaptation_field::Pcr;
use crate::packet::{PID_PAT, packets};
use crate::pes::PesHeader;
use crate::psi::{Pat, Pmt};
use crate::{Result, TsError};

/// A reassembled PES packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PesPacket {
    pub pid: u16,
    pub header: PesHeader,
    /// Random-access indicator of the packet that started this PES.
    pub random_access: bool,
    /// PCR carried by the packet that started this PES.
    pub pcr: Option<Pcr>,
    pub payload: Bytes,
}

/// Everything read from a stream.
#[derive(Debug, Clone, Default)]
pub struct TsContents {
    pub packet_count: usize,
    pub pat: Option<Pat>,
    pub pmt: Option<Pmt>,
    /// Packets that carried a PAT or PMT section.
    pub table_packets: usize,
    pub pes: Vec<PesPacket>,
}

struct Pending {
    random_access: bool,
    pcr: Option<Pcr>,
    data: BytesMut,
}

/// Parse a whole stream. Any malformed packet, bad section or continuity gap
/// fails the read.
pub fn read_ts(data: &[u8]) -> Result<TsContents> {
    let mut contents = TsContents::default();
    let mut continuity: HashMap<u16, u8> = HashMap::new();
    let mut pending: HashMap<u16, Pending> = HashMap::new();

    for packet in packets(data) {
        let packet = packet?;
        contents.packet_count += 1;

        if packet.has_payload() {
            if let Some(&previous) = continuity.get(&packet.pid) {
                let expected = (previous + 1) & 0x0F;
                if packet.continuity_counter != expected {
                    return Err(TsError::ContinuityError {
                        pid: packet.pid,
                        expected,
                        actual: packet.continuity_counter,
                    });
                }
            }
            continuity.insert(packet.pid, packet.continuity_counter);
        }

        let pmt_pid = contents
            .pat
            .as_ref()
            .and_then(|pat| pat.programs.first())
            .map(|&(_, pid)| pid);

        if packet.pid == PID_PAT {
            if let Some(section) = packet.psi_section() {
                contents.pat = Some(Pat::parse(section)?);
                contents.table_packets += 1;
            }
            continue;
        }
        if Some(packet.pid) == pmt_pid {
            if let Some(section) = packet.psi_section() {
                contents.pmt = Some(Pmt::parse(section)?);
                contents.table_packets += 1;
            }
            continue;
        }

        let is_elementary = contents
            .pmt
            .as_ref()
            .is_some_and(|pmt| pmt.streams.iter().any(|s| s.pid == packet.pid));
        if !is_elementary {
            continue;
        }

        if packet.payload_unit_start_indicator {
            if let Some(previous) = pending.remove(&packet.pid) {
                contents.pes.push(finish_pes(packet.pid, previous)?);
            }
            let adaptation = packet.adaptation();
            pending.insert(
                packet.pid,
                Pending {
                    random_access: packet.has_random_access_indicator(),
                    pcr: adaptation.and_then(|field| field.pcr),
                    data: BytesMut::from(packet.payload),
                },
            );
        } else if let Some(current) = pending.get_mut(&packet.pid) {
            current.data.extend_from_slice(packet.payload);
        }
    }

    let mut remaining: Vec<_> = pending.into_iter().collect();
    remaining.sort_by_key(|(pid, _)| *pid);
    for (pid, rest) in remaining {
        contents.pes.push(finish_pes(pid, rest)?);
    }
    Ok(contents)
}

fn finish_pes(pid: u16, pending: Pending) -> Result<PesPacket> {
    let data = pending.data.freeze();
    let (header, packet_length, offset) = PesHeader::parse(&data)?;
    let end = if packet_length == 0 {
        data.len()
    } else {
        6 + usize::from(packet_length)
    };
    if end > data.len() || end < offset {
        return Err(TsError::InsufficientData {
            expected: end,
            actual: data.len(),
        });
    }
    Ok(PesPacket {
        pid,
        header,
        random_access: pending.random_access,
        pcr: pending.pcr,
        payload: data.slice(offset..end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation_field::AdaptationField;
    use crate::muxer::{MuxerConfig, MuxerData, TsMuxer};
    use crate::packet::PACKET_SIZE;
    use crate::psi::{ElementaryStream, StreamType};

    fn muxed(frames: &[(u64, usize)]) -> BytesMut {
        let mut muxer = TsMuxer::new(MuxerConfig::default().with_tables_retransmit_period(4));
        muxer
            .add_elementary_stream(ElementaryStream {
                pid: 256,
                stream_type: StreamType::AAC_ADTS,
            })
            .unwrap();
        muxer.set_pcr_pid(256).unwrap();

        let mut buf = BytesMut::new();
        for (i, &(pts, len)) in frames.iter().enumerate() {
            let adaptation_field =
                (i == 0).then(|| AdaptationField::random_access_with_pcr(Pcr::from_90khz(pts)));
            muxer
                .write_data(
                    &MuxerData {
                        pid: 256,
                        adaptation_field,
                        pes_header: PesHeader::audio(0xC0, pts),
                        payload: Bytes::from(vec![i as u8; len]),
                    },
                    &mut buf,
                )
                .unwrap();
        }
        buf
    }

    #[test]
    fn test_reads_back_muxer_output() {
        let frames = [(0u64, 300usize), (1920, 10), (3840, 500), (5760, 184)];
        let buf = muxed(&frames);
        let contents = read_ts(&buf).unwrap();

        assert_eq!(contents.packet_count * PACKET_SIZE, buf.len());
        assert_eq!(contents.pmt.as_ref().unwrap().pcr_pid, 256);
        assert!(contents.table_packets >= 4);
        assert_eq!(contents.pes.len(), frames.len());
        for (i, (pes, &(pts, len))) in contents.pes.iter().zip(&frames).enumerate() {
            assert_eq!(pes.header.pts, Some(pts));
            assert_eq!(pes.payload.len(), len);
            assert!(pes.payload.iter().all(|&b| b == i as u8));
            assert_eq!(pes.random_access, i == 0);
            assert_eq!(pes.pcr.is_some(), i == 0);
        }
    }

    #[test]
    fn test_detects_continuity_gap() {
        let buf = muxed(&[(0, 400)]);
        // drop the second audio packet
        let mut broken = buf[..3 * PACKET_SIZE].to_vec();
        broken.extend_from_slice(&buf[4 * PACKET_SIZE..]);
        assert!(matches!(
            read_ts(&broken),
            Err(TsError::ContinuityError { pid: 256, .. })
        ));
    }

    #[test]
    fn test_detects_corrupt_pat() {
        let mut buf = muxed(&[(0, 10)]).to_vec();
        buf[10] ^= 0xFF;
        assert!(matches!(
            read_ts(&buf),
            Err(TsError::CrcMismatch { table_id: 0 })
        ));
    }
}
