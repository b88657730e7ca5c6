//! Single-program transport stream muxer.
//!
//! The muxer only packs bytes: every call appends whole 188-byte packets to a
//! caller-owned [`BytesMut`] and reports how many bytes it appended. Writing
//! them anywhere is left to the caller.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::adaptation_field::{AdaptationField, write_adaptation_field};
use crate::packet::{
    AFC_ADAPTATION_AND_PAYLOAD, AFC_PAYLOAD_ONLY, MAX_PAYLOAD_SIZE, PACKET_SIZE,
    PID_FIRST_ELEMENTARY, PID_NULL, PID_PAT, write_header,
};
use crate::pes::PesHeader;
use crate::psi::{ElementaryStream, Pat, Pmt};
use crate::{Result, TsError};

/// Program-level muxer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxerConfig {
    pub transport_stream_id: u16,
    pub program_number: u16,
    pub pmt_pid: u16,
    /// PAT/PMT are repeated before the next PES once this many data packets
    /// have gone out since the last emission.
    pub tables_retransmit_period: u32,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            transport_stream_id: 1,
            program_number: 1,
            pmt_pid: 0x1000,
            tables_retransmit_period: 40,
        }
    }
}

impl MuxerConfig {
    pub fn with_pmt_pid(mut self, pmt_pid: u16) -> Self {
        self.pmt_pid = pmt_pid;
        self
    }

    pub fn with_tables_retransmit_period(mut self, period: u32) -> Self {
        self.tables_retransmit_period = period;
        self
    }
}

/// One PES worth of data for a registered stream.
#[derive(Debug, Clone)]
pub struct MuxerData {
    pub pid: u16,
    /// Carried in the first packet of the PES only.
    pub adaptation_field: Option<AdaptationField>,
    pub pes_header: PesHeader,
    pub payload: Bytes,
}

/// Counters kept across the muxer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxerStats {
    pub packets: u64,
    pub pes_packets: u64,
    pub table_emissions: u64,
}

#[derive(Debug)]
pub struct TsMuxer {
    config: MuxerConfig,
    streams: Vec<ElementaryStream>,
    pcr_pid: Option<u16>,
    continuity: HashMap<u16, u8>,
    packets_since_tables: u32,
    tables_written: bool,
    stats: MuxerStats,
}

impl Default for TsMuxer {
    fn default() -> Self {
        Self::new(MuxerConfig::default())
    }
}

impl TsMuxer {
    pub fn new(config: MuxerConfig) -> Self {
        Self {
            config,
            streams: Vec::new(),
            pcr_pid: None,
            continuity: HashMap::new(),
            packets_since_tables: 0,
            tables_written: false,
            stats: MuxerStats::default(),
        }
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    pub fn stats(&self) -> MuxerStats {
        self.stats
    }

    pub fn streams(&self) -> &[ElementaryStream] {
        &self.streams
    }

    pub fn add_elementary_stream(&mut self, stream: ElementaryStream) -> Result<()> {
        let pid = stream.pid;
        if !(PID_FIRST_ELEMENTARY..PID_NULL).contains(&pid) || pid == self.config.pmt_pid {
            return Err(TsError::InvalidPid(pid));
        }
        if self.stream(pid).is_some() {
            return Err(TsError::DuplicatePid(pid));
        }
        debug!(pid, stream_type = stream.stream_type.0, "Added elementary stream");
        self.streams.push(stream);
        Ok(())
    }

    /// Select the stream whose packets carry the program clock reference.
    pub fn set_pcr_pid(&mut self, pid: u16) -> Result<()> {
        if self.stream(pid).is_none() {
            return Err(TsError::UnknownPid(pid));
        }
        self.pcr_pid = Some(pid);
        Ok(())
    }

    fn stream(&self, pid: u16) -> Option<&ElementaryStream> {
        self.streams.iter().find(|s| s.pid == pid)
    }

    fn next_continuity_counter(&mut self, pid: u16) -> u8 {
        let counter = self.continuity.entry(pid).or_insert(0);
        let current = *counter;
        *counter = (current + 1) & 0x0F;
        current
    }

    /// Emit one PAT and one PMT.
    pub fn write_tables(&mut self, buf: &mut BytesMut) -> Result<usize> {
        if self.streams.is_empty() {
            return Err(TsError::NoElementaryStreams);
        }

        let pat = Pat {
            transport_stream_id: self.config.transport_stream_id,
            programs: vec![(self.config.program_number, self.config.pmt_pid)],
        };
        let pmt = Pmt {
            program_number: self.config.program_number,
            pcr_pid: self.pcr_pid.unwrap_or(PID_NULL),
            streams: self.streams.clone(),
        };

        let mut written = self.write_section(buf, PID_PAT, &pat.to_section());
        written += self.write_section(buf, self.config.pmt_pid, &pmt.to_section());

        self.packets_since_tables = 0;
        self.tables_written = true;
        self.stats.table_emissions += 1;
        trace!(
            pmt_pid = self.config.pmt_pid,
            pcr_pid = pmt.pcr_pid,
            "Wrote PAT/PMT"
        );
        Ok(written)
    }

    fn write_section(&mut self, buf: &mut BytesMut, pid: u16, section: &[u8]) -> usize {
        let mut written = 0;
        let mut remaining = section;
        let mut first = true;
        while first || !remaining.is_empty() {
            let cc = self.next_continuity_counter(pid);
            let start = buf.len();
            write_header(buf, pid, first, AFC_PAYLOAD_ONLY, cc);
            if first {
                // pointer_field
                buf.put_u8(0);
            }
            let room = PACKET_SIZE - (buf.len() - start);
            let chunk = remaining.len().min(room);
            buf.put_slice(&remaining[..chunk]);
            remaining = &remaining[chunk..];
            buf.put_bytes(0xFF, PACKET_SIZE - (buf.len() - start));

            first = false;
            written += PACKET_SIZE;
            self.stats.packets += 1;
        }
        written
    }

    /// Packetize one PES into as many packets as it needs.
    ///
    /// PAT/PMT are written first if they have never been written or are due
    /// for retransmission. The last packet is padded with adaptation-field
    /// stuffing.
    pub fn write_data(&mut self, data: &MuxerData, buf: &mut BytesMut) -> Result<usize> {
        if self.stream(data.pid).is_none() {
            return Err(TsError::UnknownPid(data.pid));
        }

        let mut pes = BytesMut::with_capacity(data.pes_header.encoded_len() + data.payload.len());
        data.pes_header.write(&mut pes, data.payload.len())?;
        pes.put_slice(&data.payload);

        let mut written = 0;
        if !self.tables_written
            || self.packets_since_tables >= self.config.tables_retransmit_period
        {
            written += self.write_tables(buf)?;
        }

        let mut remaining: &[u8] = &pes;
        let mut first = true;
        while !remaining.is_empty() {
            let field = if first {
                data.adaptation_field.as_ref()
            } else {
                None
            };
            let room = MAX_PAYLOAD_SIZE - field.map_or(0, AdaptationField::encoded_len);
            let chunk = remaining.len().min(room);
            let adaptation_len = MAX_PAYLOAD_SIZE - chunk;

            let cc = self.next_continuity_counter(data.pid);
            if adaptation_len > 0 {
                write_header(buf, data.pid, first, AFC_ADAPTATION_AND_PAYLOAD, cc);
                write_adaptation_field(buf, field, adaptation_len);
            } else {
                write_header(buf, data.pid, first, AFC_PAYLOAD_ONLY, cc);
            }
            buf.put_slice(&remaining[..chunk]);
            remaining = &remaining[chunk..];

            first = false;
            written += PACKET_SIZE;
            self.packets_since_tables += 1;
            self.stats.packets += 1;
        }

        self.stats.pes_packets += 1;
        Ok(written)
    }
}
