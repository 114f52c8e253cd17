// Engine settings, read on startup and written back on quit.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::{DEFAULT_XRUN_TOLERANCE, EffectSpec};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::shared::TICKS_PER_BEAT;

pub const DRUMSEQ_DIR: &str = ".drumseq";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub buffer_frames: usize,
    pub driver: String, // "cpal" or "null"
    pub event_capacity: usize,
    pub command_capacity: usize,

    pub metronome: bool,
    pub record: bool,
    pub quantize: bool,
    pub quantize_grid: u32, // ticks; 12 is a sixteenth

    pub tap_window: usize,
    pub tap_timeout_ms: u64,
    pub xrun_tolerance: f32, // in buffer periods
    pub history_limit: Option<usize>, // None keeps every undo step

    pub fx: Vec<EffectSpec>, // one per send slot, in order
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_frames: 512,
            driver: String::from("cpal"),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            command_capacity: 256,
            metronome: false,
            record: false,
            quantize: true,
            quantize_grid: TICKS_PER_BEAT / 4,
            tap_window: 8,
            tap_timeout_ms: 2000,
            xrun_tolerance: DEFAULT_XRUN_TOLERANCE,
            history_limit: None,
            fx: vec![
                EffectSpec::Distortion { drive: 4.0 },
                EffectSpec::Bitcrusher { levels: 16 },
            ],
        }
    }
}

impl EngineConfig {
    /// Settings for tests and offline rendering: no audio device.
    pub fn headless() -> Self {
        Self {
            driver: String::from("null"),
            ..Self::default()
        }
    }

    pub fn tap_timeout(&self) -> Duration {
        Duration::from_millis(self.tap_timeout_ms)
    }

    pub fn quantize_grid(&self) -> u32 {
        self.quantize_grid.max(1)
    }
}

// <project_dir>/.drumseq/config.json
pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DRUMSEQ_DIR).join(CONFIG_FILE)
}

/// Missing file means defaults; a broken one is logged and ignored.
pub fn load_config(project_dir: &Path) -> EngineConfig {
    let path = config_file_path(project_dir);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(_) => return EngineConfig::default(),
    };
    match serde_json::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            EngineConfig::default()
        }
    }
}

pub fn save_config(project_dir: &Path, config: &EngineConfig) -> anyhow::Result<()> {
    let path = config_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
