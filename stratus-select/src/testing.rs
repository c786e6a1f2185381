//! Shared test scaffolding: a configurable protocol stub.

use smallvec::SmallVec;

use stratus_core::{
    CfgIndex, DtClass, EpConfigKey, LinearFunc, MemType, OpId, SelectError, SelectParam, Worker,
};

use crate::proto::{
    CfgThreshold, PerfRange, ProtoCaps, ProtoInitOut, ProtoInitParams, Protocol,
};

/// A protocol whose capabilities are fixed at construction time.
pub(crate) struct TestProto {
    name: &'static str,
    min_length: usize,
    ranges: SmallVec<[PerfRange; 4]>,
    cfg_thresh: CfgThreshold,
    priv_data: Vec<u8>,
    fail: bool,
}

impl TestProto {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            min_length: 0,
            ranges: SmallVec::new(),
            cfg_thresh: CfgThreshold::Auto,
            priv_data: Vec::new(),
            fail: false,
        }
    }

    pub(crate) fn with_range(mut self, max_length: usize, perf: LinearFunc) -> Self {
        self.ranges.push(PerfRange { max_length, perf });
        self
    }

    pub(crate) fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub(crate) fn with_cfg_thresh(mut self, cfg_thresh: CfgThreshold) -> Self {
        self.cfg_thresh = cfg_thresh;
        self
    }

    pub(crate) fn with_priv_data(mut self, priv_data: Vec<u8>) -> Self {
        self.priv_data = priv_data;
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Protocol for TestProto {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(
        &self,
        _params: &ProtoInitParams<'_>,
        priv_buf: &mut [u8],
    ) -> Result<ProtoInitOut, SelectError> {
        if self.fail {
            return Err(SelectError::NoProtocols);
        }

        let mut caps = ProtoCaps::new(self.min_length).with_cfg_thresh(self.cfg_thresh);
        for range in &self.ranges {
            caps = caps.with_range(range.max_length, range.perf);
        }

        priv_buf[..self.priv_data.len()].copy_from_slice(&self.priv_data);
        Ok(ProtoInitOut {
            caps,
            priv_size: self.priv_data.len(),
        })
    }

    fn config_str(&self, priv_data: &[u8]) -> String {
        String::from_utf8_lossy(priv_data).into_owned()
    }
}

/// A worker with one endpoint configuration.
pub(crate) fn test_worker() -> (Worker, CfgIndex) {
    let mut worker = Worker::new();
    let ep = worker.add_ep_config(EpConfigKey::new(1.0e-6, 10.0e9));
    (worker, ep)
}

pub(crate) fn test_param() -> SelectParam {
    SelectParam::new(OpId::TagSend, DtClass::Contig, MemType::Host)
}
