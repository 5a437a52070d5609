use flvrec_flv::ProcessorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Bytes requested from the input per read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Replace an existing output file instead of failing
    #[serde(default)]
    pub overwrite: bool,
}

fn default_read_chunk_size() -> usize {
    4096
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            overwrite: false,
        }
    }
}
