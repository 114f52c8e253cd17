//! Song and pattern files on disk.
//!
//! Songs are pretty-printed JSON wrapped in a versioned envelope. Sample
//! paths under the song's own directory are written relative to it so a
//! project folder can be moved as a whole. Pattern files name instruments
//! by row, since ids mean nothing outside the song that issued them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{InstrumentId, InstrumentList, Note, Pattern, Song};
use crate::loader::sample_loader;

pub const SONG_EXTENSION: &str = "dsong";
pub const PATTERN_EXTENSION: &str = "dpattern";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid file: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has format version {found}, newest readable is {FORMAT_VERSION}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("the song has not been saved yet, pick a file name")]
    NoFilename,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io { path: path.to_path_buf(), source }
}

fn json_err(path: &Path) -> impl FnOnce(serde_json::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Json { path: path.to_path_buf(), source }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct SongFile {
    version: u32,
    song: Song,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct RowNote {
    row: usize,
    position: u32,
    length: Option<u32>,
    velocity: f32,
    pan_l: f32,
    pan_r: f32,
    key: u8,
    octave: i8,
    midi: bool,
    instrument_mode: bool,
}

impl RowNote {
    fn from_note(row: usize, n: &Note) -> Self {
        Self {
            row,
            position: n.position,
            length: n.length,
            velocity: n.velocity,
            pan_l: n.pan_l,
            pan_r: n.pan_r,
            key: n.key,
            octave: n.octave,
            midi: n.midi,
            instrument_mode: n.instrument_mode,
        }
    }

    fn to_note(&self, instrument: InstrumentId) -> Note {
        Note {
            instrument,
            position: self.position,
            length: self.length,
            velocity: self.velocity,
            pan_l: self.pan_l,
            pan_r: self.pan_r,
            key: self.key,
            octave: self.octave,
            midi: self.midi,
            instrument_mode: self.instrument_mode,
        }
        .clamped()
    }
}

#[derive(Serialize, Deserialize)]
struct PatternFile {
    version: u32,
    name: String,
    category: String,
    length: u32,
    notes: Vec<RowNote>,
}

fn read_checked(path: &Path) -> Result<String, PersistenceError> {
    let data = std::fs::read_to_string(path).map_err(io_err(path))?;
    let probe: VersionProbe = serde_json::from_str(&data).map_err(json_err(path))?;
    if probe.version > FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion { path: path.to_path_buf(), found: probe.version });
    }
    Ok(data)
}

fn write_json(path: &Path, json: String) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::write(path, json).map_err(io_err(path))
}

/// Writes `song` to `path`. The in-memory song is left untouched; the caller
/// decides what the filename and modified flag become.
pub fn save_song(song: &Song, path: &Path) -> Result<(), PersistenceError> {
    let mut song = song.clone();
    if let Some(base) = path.parent() {
        for inst in song.instruments.iter_mut() {
            for layer in &mut inst.layers {
                if let Ok(rel) = Path::new(&layer.sample_path).strip_prefix(base) {
                    layer.sample_path = rel.to_string_lossy().into_owned();
                }
            }
        }
    }
    let file = SongFile { version: FORMAT_VERSION, song };
    let json = serde_json::to_string_pretty(&file).map_err(json_err(path))?;
    write_json(path, json)
}

/// Reads a song, repairs what `Song::sanitize` covers and decodes its samples at
/// `sample_rate`. Missing samples are logged and leave their layer silent.
pub fn load_song(path: &Path, sample_rate: u32) -> Result<Song, PersistenceError> {
    let data = read_checked(path)?;
    let file: SongFile = serde_json::from_str(&data).map_err(json_err(path))?;
    let mut song = file.song;

    let base = path.parent().unwrap_or(Path::new(""));
    for inst in song.instruments.iter_mut() {
        for layer in &mut inst.layers {
            let sample = Path::new(&layer.sample_path);
            if !layer.sample_path.is_empty() && sample.is_relative() {
                layer.sample_path = base.join(sample).to_string_lossy().into_owned();
            }
        }
    }

    let fixed = song.sanitize();
    if fixed > 0 {
        log::warn!("{}: repaired {fixed} broken values", path.display());
    }
    let missing = sample_loader::load_song_samples(&mut song, sample_rate);
    if missing > 0 {
        log::warn!("{}: {missing} samples could not be loaded", path.display());
    }
    song.set_filename(Some(path.to_path_buf()));
    song.set_modified(false);
    log::info!("loaded song '{}' from {}", song.name, path.display());
    Ok(song)
}

pub fn save_pattern(pattern: &Pattern, instruments: &InstrumentList, path: &Path) -> Result<(), PersistenceError> {
    let notes = pattern
        .notes()
        .iter()
        .filter_map(|n| instruments.row_of(n.instrument).map(|row| RowNote::from_note(row, n)))
        .collect();
    let file = PatternFile {
        version: FORMAT_VERSION,
        name: pattern.name.clone(),
        category: pattern.category.clone(),
        length: pattern.length(),
        notes,
    };
    let json = serde_json::to_string_pretty(&file).map_err(json_err(path))?;
    write_json(path, json)
}

/// Reads a pattern file against the rows of `instruments`. Notes on rows
/// the list does not have, or past the pattern end, are dropped.
pub fn load_pattern(path: &Path, instruments: &InstrumentList) -> Result<Pattern, PersistenceError> {
    let data = read_checked(path)?;
    let file: PatternFile = serde_json::from_str(&data).map_err(json_err(path))?;

    let mut pattern = Pattern::new(file.name, file.length);
    pattern.category = file.category;
    let mut dropped = 0;
    for rn in &file.notes {
        let Some(id) = instruments.id_at(rn.row) else {
            dropped += 1;
            continue;
        };
        if rn.position >= pattern.length() || pattern.insert_note(rn.to_note(id)).is_err() {
            dropped += 1;
        }
    }
    if dropped > 0 {
        log::warn!("{}: dropped {dropped} notes that do not fit this song", path.display());
    }
    Ok(pattern)
}
