use pipeline_common::DEFAULT_QUEUE_CAPACITY;
use ts::MuxerConfig;

/// Settings for one remux run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemuxConfig {
    /// Frames the producer may run ahead of the consumer.
    pub queue_capacity: usize,
    /// PID of the audio elementary stream; also carries the PCR.
    pub pid: u16,
    pub pmt_pid: u16,
    /// PES stream id of the audio stream.
    pub stream_id: u8,
    /// Data packets between PAT/PMT retransmissions.
    pub tables_retransmit_period: u32,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pid: 256,
            pmt_pid: 0x1000,
            stream_id: 0xC0,
            tables_retransmit_period: 40,
        }
    }
}

impl RemuxConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_pid(mut self, pid: u16) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_pmt_pid(mut self, pmt_pid: u16) -> Self {
        self.pmt_pid = pmt_pid;
        self
    }

    pub fn with_stream_id(mut self, stream_id: u8) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn with_tables_retransmit_period(mut self, period: u32) -> Self {
        self.tables_retransmit_period = period;
        self
    }

    pub(crate) fn muxer_config(&self) -> MuxerConfig {
        MuxerConfig::default()
            .with_pmt_pid(self.pmt_pid)
            .with_tables_retransmit_period(self.tables_retransmit_period)
    }
}
