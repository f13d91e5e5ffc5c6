use crate::{dsp::smooth::OnePole, routing::SlotSet};

/// Smoothing time constant applied to every parameter's base value.
const SMOOTH_TIME: f32 = 0.02;

/// Mapping between a parameter's normalized [0, 1] position and its plain
/// value. `skew` bends the curve (`plain = min + span * norm^skew`); a skew
/// of 1 is linear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub skew: f32,
}

impl ParamRange {
    pub fn linear(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            skew: 1.0,
        }
    }

    pub fn skewed(min: f32, max: f32, skew: f32) -> Self {
        debug_assert!(skew > 0.0);
        Self { min, max, skew }
    }

    #[inline]
    pub fn to_plain(&self, norm: f32) -> f32 {
        let n = norm.clamp(0.0, 1.0);
        let shaped = if self.skew == 1.0 { n } else { n.powf(self.skew) };
        self.min + (self.max - self.min) * shaped
    }

    #[inline]
    pub fn to_normalized(&self, plain: f32) -> f32 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 0.0;
        }
        let p = ((plain - self.min) / span).clamp(0.0, 1.0);
        if self.skew == 1.0 {
            p
        } else {
            p.powf(1.0 / self.skew)
        }
    }
}

/// A modulatable parameter.
///
/// The effective per-sample value is the smoothed base plus every bound
/// slot's signal, accumulated in the normalized domain, clamped, then mapped
/// through the range. The back-reference set records which slots currently
/// modulate this parameter; it is membership only and carries no ownership.
/// Only the router may mutate it, via the registry's crate-private hooks.
pub struct ModParam {
    id: String,
    range: ParamRange,
    smoother: OnePole,
    modulated_by: SlotSet,
    norm: Vec<f32>,
    plain: Vec<f32>,
    block_len: usize,
}

impl ModParam {
    pub fn new(id: impl Into<String>, range: ParamRange, default_plain: f32) -> Self {
        let mut smoother = OnePole::new(SMOOTH_TIME);
        smoother.snap_to(range.to_normalized(default_plain));
        Self {
            id: id.into(),
            range,
            smoother,
            modulated_by: SlotSet::default(),
            norm: Vec::new(),
            plain: Vec::new(),
            block_len: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn range(&self) -> ParamRange {
        self.range
    }

    /// Set the base value in plain units; the change glides in over the
    /// smoothing time.
    pub fn set_base_plain(&mut self, plain: f32) {
        self.smoother.set_target(self.range.to_normalized(plain));
    }

    pub fn set_base_normalized(&mut self, norm: f32) {
        self.smoother.set_target(norm.clamp(0.0, 1.0));
    }

    pub fn base_plain(&self) -> f32 {
        self.range.to_plain(self.smoother.target())
    }

    /// Jump the smoother to its target. Used on preset restore.
    pub fn snap(&mut self) {
        let target = self.smoother.target();
        self.smoother.snap_to(target);
    }

    /// Size the per-block buffers and retune the smoother. Not audio-safe.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) {
        self.smoother.set_sample_rate(sample_rate);
        self.norm.clear();
        self.norm.resize(block_size, 0.0);
        self.plain.clear();
        self.plain.resize(block_size, 0.0);
        self.block_len = 0;
    }

    /// Fill the block with smoothed base values. Any previous modulation
    /// is discarded; slots re-apply theirs every block.
    pub(crate) fn begin_block(&mut self, num: usize) {
        debug_assert!(num <= self.norm.len(), "run_block before prepare");
        let num = num.min(self.norm.len());
        for value in &mut self.norm[..num] {
            *value = self.smoother.next();
        }
        self.block_len = num;
    }

    /// Accumulate a slot's normalized signal into this block.
    pub(crate) fn add_modulation(&mut self, signal: &[f32]) {
        debug_assert_eq!(signal.len(), self.block_len);
        for (acc, s) in self.norm[..self.block_len].iter_mut().zip(signal) {
            *acc += s;
        }
    }

    /// Map the accumulated normalized values to plain values.
    pub(crate) fn finalize_block(&mut self) {
        for (plain, &norm) in self.plain[..self.block_len]
            .iter_mut()
            .zip(&self.norm[..self.block_len])
        {
            *plain = self.range.to_plain(norm);
        }
    }

    /// Normalized values accumulated so far this block.
    pub(crate) fn norm_values(&self) -> &[f32] {
        &self.norm[..self.block_len]
    }

    /// Effective plain values for the last processed block.
    pub fn values(&self) -> &[f32] {
        &self.plain[..self.block_len]
    }

    pub fn modulators(&self) -> SlotSet {
        self.modulated_by
    }

    pub fn is_modulated_by(&self, slot: usize) -> bool {
        self.modulated_by.contains(slot)
    }

    pub(crate) fn with_modulation(&mut self, slot: usize) {
        self.modulated_by.insert(slot);
    }

    pub(crate) fn remove_modulation(&mut self, slot: usize) {
        self.modulated_by.remove(slot);
    }
}
