use crate::params::{ParamHandle, ParamRange};

/// One modulation binding: a catalogue source, an optional target
/// parameter, and an amount parameter that scales the signal.
///
/// Slots are created once, at a fixed count, during layout; afterwards only
/// their bindings mutate. The slot holds its target as a registry handle and
/// resolves it at evaluation time, so a reassignment can never leave a
/// dangling reference. The amount is itself a registry parameter (range
/// [-1, 1]), which is what lets one slot modulate another slot's depth.
pub struct ModSlot {
    source: usize,
    target: Option<ParamHandle>,
    amount: ParamHandle,
    scratch: Vec<f32>,
}

impl ModSlot {
    pub(crate) fn new(amount: ParamHandle) -> Self {
        Self {
            source: 0,
            target: None,
            amount,
            scratch: Vec::new(),
        }
    }

    #[inline]
    pub fn source(&self) -> usize {
        self.source
    }

    #[inline]
    pub fn target(&self) -> Option<ParamHandle> {
        self.target
    }

    #[inline]
    pub fn amount(&self) -> ParamHandle {
        self.amount
    }

    /// Swap the source. Takes effect at the next evaluation; an id outside
    /// the catalogue reads as silence.
    pub fn rebind(&mut self, source: usize) {
        self.source = source;
    }

    /// Update the stored target. Registry bookkeeping is the router's job;
    /// nothing else may call this.
    pub(crate) fn set_target(&mut self, target: Option<ParamHandle>) {
        self.target = target;
    }

    /// Size the scratch buffer for a block size. Must precede
    /// `compute_normalized`; not safe to call concurrently with it.
    pub fn prepare(&mut self, block_size: usize) {
        self.scratch.clear();
        self.scratch.resize(block_size, 0.0);
    }

    /// Evaluate the slot's signal for `num` samples: the source row scaled
    /// per-sample by the amount parameter, clamped to [-1, 1].
    ///
    /// `row` is the source's rendered bank row (`None` reads as silence),
    /// `amount_norm`/`amount_range` describe the amount parameter's values
    /// so far this block. Writes into the pre-sized scratch buffer only.
    pub(crate) fn compute_normalized(
        &mut self,
        row: Option<&[f32]>,
        amount_norm: &[f32],
        amount_range: ParamRange,
        num: usize,
    ) -> &[f32] {
        debug_assert!(num <= self.scratch.len(), "compute before prepare");
        let num = num.min(self.scratch.len());
        let out = &mut self.scratch[..num];

        match row {
            None => out.fill(0.0),
            Some(row) => {
                debug_assert!(num <= row.len() && num <= amount_norm.len());
                for i in 0..num {
                    let amount = amount_range.to_plain(amount_norm[i]);
                    out[i] = (row[i] * amount).clamp(-1.0, 1.0);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ModParam, ParamRegistry};

    const AMOUNT_RANGE: ParamRange = ParamRange {
        min: -1.0,
        max: 1.0,
        skew: 1.0,
    };

    fn amount_handle() -> ParamHandle {
        let mut registry = ParamRegistry::new();
        registry.attach(ModParam::new("Mod Amount 1", AMOUNT_RANGE, 0.0))
    }

    #[test]
    fn output_length_matches_request() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(256);

        let row = vec![1.0; 256];
        let amount = vec![0.5; 256];
        let signal = slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 200);
        assert_eq!(signal.len(), 200);
    }

    #[test]
    fn constant_source_times_half_amount() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(64);

        // Source at 1.0, amount at normalized 0.75 -> plain +0.5
        let row = vec![1.0; 64];
        let amount = vec![0.75; 64];
        let signal = slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 64);
        for &s in signal {
            assert!((s - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn negative_amount_inverts() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(16);

        let row = vec![0.5; 16];
        let amount = vec![0.0; 16]; // normalized 0 -> plain -1
        let signal = slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 16);
        for &s in signal {
            assert!((s + 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_row_reads_as_silence() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(32);

        let amount = vec![1.0; 32];
        let signal = slot.compute_normalized(None, &amount, AMOUNT_RANGE, 32);
        assert!(signal.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn reprepare_resizes_the_scratch() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(128);

        let row = vec![1.0; 512];
        let amount = vec![1.0; 512];
        assert_eq!(
            slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 128)
                .len(),
            128
        );

        slot.prepare(512);
        assert_eq!(
            slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 512)
                .len(),
            512
        );
    }

    #[test]
    fn output_never_exceeds_amount_bound() {
        let mut slot = ModSlot::new(amount_handle());
        slot.prepare(64);

        let row = vec![1.0; 64];
        for &norm in &[0.0, 0.25, 0.5, 0.8, 1.0] {
            let amount = vec![norm; 64];
            let bound = AMOUNT_RANGE.to_plain(norm).abs();
            let signal = slot.compute_normalized(Some(&row), &amount, AMOUNT_RANGE, 64);
            for &s in signal {
                assert!(s.abs() <= bound + 1e-6);
            }
        }
    }
}
