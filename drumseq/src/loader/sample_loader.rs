use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::audio::SampleBuffer;
use crate::song::{Instrument, Layer, Song};

// Load a WAV from disk at the engine rate
pub fn load(path: &Path, target_rate: u32) -> anyhow::Result<SampleBuffer> {
    SampleBuffer::load_wav(path, target_rate).with_context(|| format!("failed to load {}", path.display()))
}

/// Every .wav directly inside `dir`, sorted by file name.
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Decodes every layer of `song` that names a sample. Layers whose file is
/// missing or unreadable stay silent; returns how many those were.
pub fn load_song_samples(song: &mut Song, target_rate: u32) -> usize {
    let mut failed = 0;
    for instrument in song.instruments.iter_mut() {
        for layer in &mut instrument.layers {
            if layer.sample_path.is_empty() {
                continue;
            }
            match load(Path::new(&layer.sample_path), target_rate) {
                Ok(buffer) => layer.buffer = Some(Arc::new(buffer)),
                Err(e) => {
                    log::warn!("instrument '{}': {e:#}", instrument.name);
                    layer.buffer = None;
                    failed += 1;
                }
            }
        }
    }
    failed
}

/// One instrument per WAV in `dir`, named after the file. Files that fail to
/// decode are skipped with a warning.
pub fn kit_from_dir(dir: &Path, target_rate: u32) -> anyhow::Result<Vec<Instrument>> {
    let mut kit = Vec::new();
    for path in index_wav_in_dir(dir)? {
        let buffer = match load(&path, target_rate) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("{e:#}");
                continue;
            }
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("Sample"));
        let mut layer = Layer::new(path.to_string_lossy());
        layer.buffer = Some(Arc::new(buffer));
        kit.push(Instrument::new(name).with_layer(layer));
    }
    Ok(kit)
}
