// Instruments and the generation-checked list that owns them.
//
// Notes point at instruments through `InstrumentId`, never through a row
// number. Rows shift whenever an instrument is added or removed; an id keeps
// naming the same instrument until that instrument is gone, and a stale id
// simply stops resolving.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::SampleBuffer;
use crate::shared::MAX_FX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId {
    index: u32,
    generation: u32,
}

impl InstrumentId {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One sample of an instrument, picked by note velocity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Layer {
    pub sample_path: String,
    pub min_velocity: f32,
    pub max_velocity: f32,
    pub gain: f32,
    pub pitch: f32, // playback speed, 1.0 = as recorded

    // decoded on load, never written to disk
    #[serde(skip)]
    pub buffer: Option<Arc<SampleBuffer>>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            sample_path: String::new(),
            min_velocity: 0.0,
            max_velocity: 1.0,
            gain: 1.0,
            pitch: 1.0,
            buffer: None,
        }
    }
}

// the decoded buffer is not part of what a layer is
impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.sample_path == other.sample_path
            && self.min_velocity == other.min_velocity
            && self.max_velocity == other.max_velocity
            && self.gain == other.gain
            && self.pitch == other.pitch
    }
}

impl Layer {
    pub fn new(sample_path: impl Into<String>) -> Self {
        Self {
            sample_path: sample_path.into(),
            ..Self::default()
        }
    }

    pub fn with_buffer(buffer: SampleBuffer) -> Self {
        Self {
            buffer: Some(Arc::new(buffer)),
            ..Self::default()
        }
    }

    pub fn accepts(&self, velocity: f32) -> bool {
        velocity >= self.min_velocity && velocity <= self.max_velocity
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub name: String,
    pub volume: f32,
    pub muted: bool,
    pub pan_l: f32,
    pub pan_r: f32,
    pub fx_sends: [f32; MAX_FX],
    pub layers: Vec<Layer>,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: String::from("Instrument"),
            volume: 1.0,
            muted: false,
            pan_l: 0.5,
            pan_r: 0.5,
            fx_sends: [0.0; MAX_FX],
            layers: Vec::new(),
        }
    }
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// First layer whose velocity range covers `velocity`, falling back to the
    /// first layer so a badly mapped kit still sounds.
    pub fn layer_for(&self, velocity: f32) -> Option<(usize, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .find(|(_, l)| l.accepts(velocity))
            .or_else(|| self.layers.first().map(|l| (0, l)))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    // highest generation ever handed out for this slot
    issued: u32,
    instrument: Option<Instrument>,
}

/// Ordered instrument rows backed by an arena of generation-checked slots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstrumentList {
    slots: Vec<Slot>,
    order: Vec<InstrumentId>,
}

impl InstrumentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: InstrumentId) -> Option<&Instrument> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instrument.as_ref()
    }

    pub fn get_mut(&mut self, id: InstrumentId) -> Option<&mut Instrument> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instrument.as_mut()
    }

    pub fn contains(&self, id: InstrumentId) -> bool {
        self.get(id).is_some()
    }

    pub fn id_at(&self, row: usize) -> Option<InstrumentId> {
        self.order.get(row).copied()
    }

    pub fn row_of(&self, id: InstrumentId) -> Option<usize> {
        self.order.iter().position(|&i| i == id)
    }

    pub fn at(&self, row: usize) -> Option<&Instrument> {
        self.get(self.id_at(row)?)
    }

    pub fn at_mut(&mut self, row: usize) -> Option<&mut Instrument> {
        let id = self.id_at(row)?;
        self.get_mut(id)
    }

    pub fn ids(&self) -> &[InstrumentId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstrumentId, &Instrument)> {
        self.order.iter().filter_map(|&id| self.get(id).map(|i| (id, i)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instrument> {
        self.slots.iter_mut().filter_map(|s| s.instrument.as_mut())
    }

    /// The id the next fresh insert will receive.
    pub fn next_id(&self) -> InstrumentId {
        match self.slots.iter().position(|s| s.instrument.is_none()) {
            Some(index) => InstrumentId {
                index: index as u32,
                generation: self.slots[index].issued + 1,
            },
            None => InstrumentId {
                index: self.slots.len() as u32,
                generation: 0,
            },
        }
    }

    pub fn push(&mut self, instrument: Instrument) -> InstrumentId {
        let id = self.next_id();
        let row = self.len();
        self.insert_with_id(row, id, instrument);
        id
    }

    /// Puts `instrument` at `row` under exactly `id`. Used by fresh inserts
    /// and by undo, which must bring back the binding notes were made with.
    /// Returns false (and changes nothing) if the row is out of range or the
    /// slot is taken.
    pub(crate) fn insert_with_id(&mut self, row: usize, id: InstrumentId, instrument: Instrument) -> bool {
        if row > self.order.len() {
            return false;
        }
        let index = id.index();
        if index > self.slots.len() {
            return false;
        }
        if index == self.slots.len() {
            self.slots.push(Slot::default());
        }
        let slot = &mut self.slots[index];
        if slot.instrument.is_some() {
            return false;
        }
        slot.generation = id.generation;
        slot.issued = slot.issued.max(id.generation);
        slot.instrument = Some(instrument);
        self.order.insert(row, id);
        true
    }

    pub(crate) fn remove(&mut self, row: usize) -> Option<(InstrumentId, Instrument)> {
        let id = self.id_at(row)?;
        let instrument = self.slots.get_mut(id.index())?.instrument.take()?;
        self.order.remove(row);
        Some((id, instrument))
    }
}

// Two lists are equal when they hold the same instruments, under the same
// ids, in the same row order. Free-slot bookkeeping is not compared.
impl PartialEq for InstrumentList {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self
                .order
                .iter()
                .all(|&id| self.get(id) == other.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_ids_stay_consistent() {
        let mut list = InstrumentList::new();
        let kick = list.push(Instrument::new("Kick"));
        let snare = list.push(Instrument::new("Snare"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.row_of(snare), Some(1));

        let (removed, inst) = list.remove(0).unwrap();
        assert_eq!(removed, kick);
        assert_eq!(inst.name, "Kick");
        assert_eq!(list.row_of(snare), Some(0));
        assert!(list.get(kick).is_none());
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let mut list = InstrumentList::new();
        let kick = list.push(Instrument::new("Kick"));
        list.remove(0);
        let hat = list.push(Instrument::new("Hat"));
        assert_eq!(hat.index(), kick.index());
        assert_ne!(hat, kick);
        assert!(list.get(kick).is_none());
        assert_eq!(list.get(hat).unwrap().name, "Hat");
    }

    #[test]
    fn restoring_an_id_brings_back_the_binding() {
        let mut list = InstrumentList::new();
        let kick = list.push(Instrument::new("Kick"));
        list.push(Instrument::new("Snare"));
        let before = list.clone();

        let (id, inst) = list.remove(0).unwrap();
        assert!(list.insert_with_id(0, id, inst));
        assert_eq!(list, before);
        assert_eq!(list.get(kick).unwrap().name, "Kick");
    }

    #[test]
    fn occupied_slot_is_not_overwritten() {
        let mut list = InstrumentList::new();
        let kick = list.push(Instrument::new("Kick"));
        assert!(!list.insert_with_id(0, kick, Instrument::new("Imposter")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn layer_falls_back_to_first() {
        let mut soft = Layer::new("soft.wav");
        soft.max_velocity = 0.5;
        let mut hard = Layer::new("hard.wav");
        hard.min_velocity = 0.6;
        let inst = Instrument::new("Snare").with_layer(soft).with_layer(hard);
        assert_eq!(inst.layer_for(0.3).unwrap().0, 0);
        assert_eq!(inst.layer_for(0.9).unwrap().0, 1);
        assert_eq!(inst.layer_for(0.55).unwrap().0, 0);
    }
}
