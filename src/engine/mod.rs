//! The block processor driving sources, slots, and parameter smoothing.
//!
//! Layout happens through [`EngineBuilder`]: register parameters, pick a
//! slot count, then `build`. Building is the point of no return: the
//! parameter set and slot pool are fixed from then on, which is what makes
//! handles safe to hold on the audio thread. At runtime the engine's
//! `run_block` is the only audio-context entry point; everything it does is
//! allocation-free and lock-free.

use crate::{
    params::{ModParam, ParamHandle, ParamRange, ParamRegistry},
    routing::{event::ControlEvent, ModRouter, ModSlot},
    sources::{PlaybackCtx, SourceBank, SourceCatalogue},
    state::{Snapshot, SnapshotEntry},
    MAX_BLOCK_SIZE, MAX_SLOTS,
};

#[cfg(feature = "rtrb")]
use crate::routing::event::ControlHandle;

/// Capacity of the control-event ring. Control changes arrive at UI rate,
/// so a modest ring absorbs any realistic burst between two blocks.
#[cfg(feature = "rtrb")]
const CONTROL_QUEUE_CAPACITY: usize = 256;

struct Prebind {
    slot: usize,
    target_id: String,
    source: usize,
    amount: f32,
}

/// Layout-time construction of a [`ModEngine`].
pub struct EngineBuilder {
    registry: ParamRegistry,
    catalogue: SourceCatalogue,
    ordinary: Vec<ParamHandle>,
    slot_count: usize,
    prebinds: Vec<Prebind>,
}

impl EngineBuilder {
    /// Start a layout with the stock source catalogue.
    pub fn new() -> Self {
        Self {
            registry: ParamRegistry::new(),
            catalogue: SourceCatalogue::builtin(),
            ordinary: Vec::new(),
            slot_count: 0,
            prebinds: Vec::new(),
        }
    }

    /// Replace the source catalogue.
    pub fn catalogue(&mut self, catalogue: SourceCatalogue) -> &mut Self {
        self.catalogue = catalogue;
        self
    }

    /// Register a modulatable parameter. Registration order is the order
    /// parameters appear in the host-facing target choice list.
    pub fn param(&mut self, id: &str, range: ParamRange, default_plain: f32) -> ParamHandle {
        let handle = self.registry.attach(ModParam::new(id, range, default_plain));
        if !self.ordinary.contains(&handle) {
            self.ordinary.push(handle);
        }
        handle
    }

    /// Set the number of modulation slots.
    pub fn slots(&mut self, count: usize) -> &mut Self {
        debug_assert!(count <= MAX_SLOTS);
        self.slot_count = count.min(MAX_SLOTS);
        self
    }

    /// Pre-wire a slot at build time: target by id, source by catalogue id,
    /// amount in [-1, 1]. The amount is snapped, not glided.
    pub fn bind_slot(
        &mut self,
        slot: usize,
        target_id: &str,
        source: usize,
        amount: f32,
    ) -> &mut Self {
        self.prebinds.push(Prebind {
            slot,
            target_id: target_id.to_owned(),
            source,
            amount,
        });
        self
    }

    /// Build the engine plus the control handle for the producer side of
    /// the event queue.
    #[cfg(feature = "rtrb")]
    pub fn build(self) -> (ModEngine, ControlHandle) {
        let (tx, rx) = rtrb::RingBuffer::new(CONTROL_QUEUE_CAPACITY);
        let mut engine = self.build_inner();
        engine.events = Some(rx);
        (engine, ControlHandle::new(tx))
    }

    /// Build an engine without queue plumbing, for single-context use
    /// (offline rendering, tests). Events go through `apply_event`.
    pub fn build_local(self) -> ModEngine {
        self.build_inner()
    }

    fn build_inner(self) -> ModEngine {
        let EngineBuilder {
            mut registry,
            catalogue,
            ordinary,
            slot_count,
            prebinds,
        } = self;

        // One amount parameter per slot, themselves modulatable
        let amounts: Vec<ParamHandle> = (0..slot_count)
            .map(|i| {
                registry.attach(ModParam::new(
                    format!("Mod Amount {}", i + 1),
                    ParamRange::linear(-1.0, 1.0),
                    0.0,
                ))
            })
            .collect();
        let slots: Vec<ModSlot> = amounts.iter().map(|&a| ModSlot::new(a)).collect();

        // Target choice list: None, ordinary params, then slot amounts
        let mut targets = vec![None];
        targets.extend(ordinary.iter().copied().map(Some));
        targets.extend(amounts.iter().copied().map(Some));

        let mut router = ModRouter::new(slots, targets);

        for pre in prebinds {
            if pre.slot >= slot_count {
                log::warn!("prebind names slot {} of {}", pre.slot, slot_count);
                continue;
            }
            match registry.lookup(&pre.target_id) {
                Some(handle) => router.reassign_target(&mut registry, pre.slot, Some(handle)),
                None => log::warn!("prebind target {:?} is not registered", pre.target_id),
            }
            router.slot_mut(pre.slot).rebind(pre.source);
            let amount = registry.param_mut(amounts[pre.slot]);
            amount.set_base_plain(pre.amount);
            amount.snap();
        }

        ModEngine {
            registry,
            catalogue,
            bank: SourceBank::new(),
            router,
            #[cfg(feature = "rtrb")]
            events: None,
            sample_rate: 0.0,
            block_size: 0,
            clock: 0,
            prepared: false,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio-side owner of parameters, sources, and slots.
pub struct ModEngine {
    registry: ParamRegistry,
    catalogue: SourceCatalogue,
    bank: SourceBank,
    router: ModRouter,
    #[cfg(feature = "rtrb")]
    events: Option<rtrb::Consumer<ControlEvent>>,
    sample_rate: f32,
    block_size: usize,
    clock: u64,
    prepared: bool,
}

impl ModEngine {
    /// Size every component for a sample rate and block size. Must precede
    /// `run_block`, and must run again whenever the host renegotiates the
    /// block size. Not audio-safe.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) {
        debug_assert!(sample_rate > 0.0);
        debug_assert!(block_size > 0 && block_size <= MAX_BLOCK_SIZE);
        let block_size = block_size.clamp(1, MAX_BLOCK_SIZE);

        self.sample_rate = sample_rate.max(1.0);
        self.block_size = block_size;
        self.registry.prepare(self.sample_rate, block_size);
        self.router.prepare(block_size);
        self.bank.prepare(self.catalogue.len(), block_size);
        self.prepared = true;
    }

    /// Process one block: drain control events, render sources, smooth
    /// every parameter, evaluate slots, and publish per-sample values.
    ///
    /// Allocation-free and lock-free. Calling before `prepare` is a
    /// contract violation (asserted in debug builds, no-op in release).
    pub fn run_block(&mut self, num_samples: usize) {
        debug_assert!(self.prepared, "run_block before prepare");
        if !self.prepared {
            return;
        }
        debug_assert!(num_samples <= self.block_size);
        let num = num_samples.min(self.block_size);
        if num == 0 {
            return;
        }

        self.drain_events();

        let ctx = PlaybackCtx {
            sample_rate: self.sample_rate,
            block_start: self.clock,
        };
        self.catalogue.render_into(&mut self.bank, &ctx, num);

        for param in self.registry.params_mut() {
            param.begin_block(num);
        }

        // Producers of amount modulation come before their consumers, so a
        // slot reading its amount sees this block's modulation of it.
        for pos in 0..self.router.slot_count() {
            let slot_idx = self.router.eval_order()[pos];
            let (source, target, amount) = {
                let slot = self.router.slot(slot_idx);
                (slot.source(), slot.target(), slot.amount())
            };
            let Some(target) = target else { continue };

            let amount_range = self.registry.param(amount).range();
            let row = self.bank.row(source);
            let signal = self.router.slot_mut(slot_idx).compute_normalized(
                row,
                self.registry.param(amount).norm_values(),
                amount_range,
                num,
            );
            self.registry.param_mut(target).add_modulation(signal);
        }

        for param in self.registry.params_mut() {
            param.finalize_block();
        }

        self.clock += num as u64;
    }

    /// Apply one control event immediately. The queue drain calls this
    /// between blocks; single-context hosts may call it directly.
    pub fn apply_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::SlotTarget { slot, choice } => {
                self.router
                    .apply_target_choice(&mut self.registry, slot, choice);
            }
            ControlEvent::SlotSource { slot, choice } => {
                self.router
                    .apply_source_choice(slot, self.catalogue.len(), choice);
            }
            ControlEvent::ParamBase { param, plain } => {
                self.registry.param_mut(param).set_base_plain(plain);
            }
        }
    }

    fn drain_events(&mut self) {
        #[cfg(feature = "rtrb")]
        loop {
            let event = match self.events.as_mut() {
                Some(rx) => match rx.pop() {
                    Ok(event) => event,
                    Err(_) => break,
                },
                None => break,
            };
            self.apply_event(event);
        }
    }

    /// Per-sample plain values of a parameter for the last block.
    #[inline]
    pub fn values(&self, handle: ParamHandle) -> &[f32] {
        self.registry.param(handle).values()
    }

    pub fn lookup(&self, id: &str) -> Option<ParamHandle> {
        self.registry.lookup(id)
    }

    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }

    pub fn router(&self) -> &ModRouter {
        &self.router
    }

    pub fn catalogue(&self) -> &SourceCatalogue {
        &self.catalogue
    }

    /// Capture the current bindings and base values as a flat snapshot.
    pub fn capture(&self) -> Snapshot {
        let mut entries = Vec::new();
        for handle in self.registry.handles() {
            let param = self.registry.param(handle);
            entries.push(SnapshotEntry::ParamBase {
                id: param.id().to_owned(),
                plain: param.base_plain(),
            });
        }
        for slot in 0..self.router.slot_count() {
            let s = self.router.slot(slot);
            entries.push(SnapshotEntry::SlotSource {
                slot,
                source: s.source(),
            });
            entries.push(SnapshotEntry::SlotTarget {
                slot,
                target: s.target().map(|h| self.registry.param(h).id().to_owned()),
            });
        }
        Snapshot { entries }
    }

    /// Restore a snapshot, re-running the reassignment algorithm for every
    /// slot so back-references are rebuilt rather than trusted.
    ///
    /// Every slot is first unbound, so a snapshot that names unknown
    /// parameters or sources degrades to "unbound"/"silent" rather than
    /// partially applying. Base values snap instead of gliding. This is a
    /// control-context operation.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for slot in 0..self.router.slot_count() {
            self.router.reassign_target(&mut self.registry, slot, None);
            self.router.slot_mut(slot).rebind(0);
        }

        for entry in &snapshot.entries {
            match entry {
                SnapshotEntry::ParamBase { id, plain } => match self.registry.lookup(id) {
                    Some(handle) => {
                        let param = self.registry.param_mut(handle);
                        param.set_base_plain(*plain);
                        param.snap();
                    }
                    None => log::warn!("snapshot names unknown parameter {:?}", id),
                },
                SnapshotEntry::SlotSource { slot, source } => {
                    if *slot < self.router.slot_count() {
                        self.router.slot_mut(*slot).rebind(*source);
                    } else {
                        log::warn!("snapshot names unknown slot {}", slot);
                    }
                }
                SnapshotEntry::SlotTarget { slot, target } => {
                    if *slot >= self.router.slot_count() {
                        log::warn!("snapshot names unknown slot {}", slot);
                        continue;
                    }
                    let handle = match target {
                        None => None,
                        Some(id) => {
                            let handle = self.registry.lookup(id);
                            if handle.is_none() {
                                log::warn!("snapshot targets unknown parameter {:?}", id);
                            }
                            handle
                        }
                    };
                    self.router.reassign_target(&mut self.registry, *slot, handle);
                }
            }
        }
    }

    /// Decode and restore a serialized snapshot. A malformed blob restores
    /// the all-unbound default and reports the error.
    #[cfg(feature = "serde")]
    pub fn restore_blob(&mut self, bytes: &[u8]) -> Result<(), crate::state::StateError> {
        match Snapshot::from_json(bytes) {
            Ok(snapshot) => {
                self.restore(&snapshot);
                Ok(())
            }
            Err(err) => {
                self.restore(&Snapshot::default());
                Err(err)
            }
        }
    }

    #[cfg(feature = "serde")]
    pub fn capture_blob(&self) -> Result<Vec<u8>, crate::state::StateError> {
        self.capture().to_json()
    }
}
