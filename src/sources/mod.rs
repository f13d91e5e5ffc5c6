//! Modulation source catalogue and the per-block source bank.
//!
//! The catalogue is an ordered, immutable-after-build set of named signal
//! sources; a source's position in the catalogue is its stable id. Once per
//! block every source renders one row into the [`SourceBank`], and slots read
//! rows from the bank. Rendering once and reading many times keeps the cost
//! of a source independent of how many slots use it.

use crate::dsp::generator::{Constant, PhaseGen, RandomWalk, Waveform};

/// Playback context handed to sources once per block.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackCtx {
    pub sample_rate: f32,
    /// Absolute sample index of the first sample in the block.
    pub block_start: u64,
}

/// A catalogued signal generator.
///
/// Implementors produce normalized values in [-1.0, +1.0], one per sample.
/// Sources keep their own phase/state across blocks; `reset` returns them
/// to their initial state (transport rewind, engine reset).
pub trait SignalSource: Send {
    fn render(&mut self, out: &mut [f32], ctx: &PlaybackCtx);

    fn reset(&mut self) {}
}

/// Silent source backing the "Off" catalogue entry.
pub struct Off;

impl SignalSource for Off {
    fn render(&mut self, out: &mut [f32], _ctx: &PlaybackCtx) {
        out.fill(0.0);
    }
}

/// Low frequency oscillator source.
pub struct Lfo(PhaseGen);

impl Lfo {
    pub fn new(waveform: Waveform, frequency_hz: f32) -> Self {
        Self(PhaseGen::new(waveform, frequency_hz))
    }
}

impl SignalSource for Lfo {
    fn render(&mut self, out: &mut [f32], ctx: &PlaybackCtx) {
        self.0.render(out, ctx.sample_rate);
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Slow random drift source.
pub struct Drift(RandomWalk);

impl Drift {
    pub fn new(step: f32) -> Self {
        Self(RandomWalk::new(step))
    }
}

impl SignalSource for Drift {
    fn render(&mut self, out: &mut [f32], _ctx: &PlaybackCtx) {
        self.0.render(out);
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Constant source. Mostly useful for offsets and tests.
pub struct Steady(Constant);

impl Steady {
    pub fn new(value: f32) -> Self {
        Self(Constant(value))
    }
}

impl SignalSource for Steady {
    fn render(&mut self, out: &mut [f32], _ctx: &PlaybackCtx) {
        self.0.render(out);
    }
}

struct SourceEntry {
    name: String,
    signal: Box<dyn SignalSource>,
}

/// Ordered set of named sources. Position in the catalogue is the source id.
pub struct SourceCatalogue {
    entries: Vec<SourceEntry>,
}

impl SourceCatalogue {
    /// An empty catalogue. Id 0 should be a silent source so that the
    /// default slot binding produces no modulation.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The stock catalogue: Off, four LFO shapes, and a random drift.
    pub fn builtin() -> Self {
        let mut catalogue = Self::new();
        catalogue.push("Off", Box::new(Off));
        catalogue.push("LFO Sine", Box::new(Lfo::new(Waveform::Sine, 2.0)));
        catalogue.push("LFO Triangle", Box::new(Lfo::new(Waveform::Triangle, 0.5)));
        catalogue.push("LFO Saw", Box::new(Lfo::new(Waveform::Saw, 1.0)));
        catalogue.push("LFO Square", Box::new(Lfo::new(Waveform::Square, 4.0)));
        catalogue.push("Drift", Box::new(Drift::new(2e-4)));
        catalogue
    }

    /// Append a source and return its id.
    pub fn push(&mut self, name: impl Into<String>, signal: Box<dyn SignalSource>) -> usize {
        self.entries.push(SourceEntry {
            name: name.into(),
            signal,
        });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.entries.get(id).map(|e| e.name.as_str())
    }

    /// Names in catalogue order, for host-facing choice lists.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.signal.reset();
        }
    }

    /// Render every source's row for the current block.
    pub(crate) fn render_into(&mut self, bank: &mut SourceBank, ctx: &PlaybackCtx, num: usize) {
        bank.begin_block(num);
        for (id, entry) in self.entries.iter_mut().enumerate() {
            entry.signal.render(bank.row_mut(id, num), ctx);
        }
    }
}

impl Default for SourceCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-block matrix of rendered source values, one row per catalogue entry.
///
/// Rows are pre-sized by `prepare`, so filling and reading them never
/// allocates on the audio path.
pub struct SourceBank {
    rows: Vec<Vec<f32>>,
    valid: usize,
}

impl SourceBank {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            valid: 0,
        }
    }

    /// Size the bank for a catalogue and block size. Not audio-safe.
    pub fn prepare(&mut self, num_sources: usize, block_size: usize) {
        self.rows.resize_with(num_sources, Vec::new);
        for row in &mut self.rows {
            row.clear();
            row.resize(block_size, 0.0);
        }
        self.valid = 0;
    }

    fn begin_block(&mut self, num: usize) {
        debug_assert!(self.rows.iter().all(|r| num <= r.len()));
        self.valid = num;
    }

    /// The rendered row for a source id, or `None` for an unknown id.
    ///
    /// Unknown ids happen transiently when a restored blob references a
    /// source that is not in this build's catalogue; callers treat the
    /// missing row as silence.
    #[inline]
    pub fn row(&self, id: usize) -> Option<&[f32]> {
        self.rows.get(id).map(|r| &r[..self.valid])
    }

    fn row_mut(&mut self, id: usize, num: usize) -> &mut [f32] {
        &mut self.rows[id][..num]
    }
}

impl Default for SourceBank {
    fn default() -> Self {
        Self::new()
    }
}
