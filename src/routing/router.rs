use std::cmp::Reverse;

use super::slot::ModSlot;
use crate::params::{ParamHandle, ParamRegistry};

/*
Modulation Router
=================

The router owns the fixed pool of slots and is the single writer of the
bidirectional slot<->parameter binding:

  - a slot stores at most one target handle
  - a parameter's back-reference set lists exactly the slots targeting it

Reassignment, in order:

  1. If the slot currently has a target, remove the slot from that
     parameter's back-reference set (clean up the stale binding).
  2. If the new target is the none sentinel, store "no target" and stop.
  3. Otherwise add the slot to the new parameter's back-reference set and
     store the handle.

Reassigning to the target the slot already has is a no-op, so repeated
host notifications can't double-insert.

Host-facing choice controls arrive as a normalized float in [0, 1] and map
to an index with round(value * (count - 1)). Index 0 is always "None";
indices 1.. cover the ordinary modulatable parameters in registration
order, then every slot's amount parameter in slot order. Amounts being
targets is what allows slot-on-slot modulation; the router rejects any
binding that would close a cycle through amount parameters, degrading to
"no binding" exactly like a failed lookup.

All of this runs between blocks (the engine drains the control queue at
the top of run_block), so it must not allocate: the evaluation order is
rewritten in place and the cycle check is a bounded chain walk.
*/

/// Map a normalized choice value to an index among `count` choices.
#[inline]
pub fn choice_index(normalized: f32, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (normalized.clamp(0.0, 1.0) * (count - 1) as f32).round() as usize
}

/// Owner of the slot pool and the only mutator of slot<->parameter bindings.
pub struct ModRouter {
    slots: Vec<ModSlot>,
    /// Choice table for target selection. Entry 0 is the none sentinel.
    targets: Vec<Option<ParamHandle>>,
    /// Slot indices in evaluation order: producers of amount modulation
    /// come before their consumers.
    eval_order: Vec<usize>,
}

impl ModRouter {
    pub(crate) fn new(slots: Vec<ModSlot>, targets: Vec<Option<ParamHandle>>) -> Self {
        debug_assert!(targets.first().map_or(true, |t| t.is_none()));
        let count = slots.len();
        let mut router = Self {
            slots,
            targets,
            eval_order: (0..count).collect(),
        };
        router.rebuild_eval_order();
        router
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries in the target choice list (including "None").
    pub fn target_choice_count(&self) -> usize {
        self.targets.len()
    }

    pub fn slot(&self, index: usize) -> &ModSlot {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut ModSlot {
        &mut self.slots[index]
    }

    pub(crate) fn eval_order(&self) -> &[usize] {
        &self.eval_order
    }

    /// Fan `prepare` out to every slot. Not audio-safe.
    pub fn prepare(&mut self, block_size: usize) {
        for slot in &mut self.slots {
            slot.prepare(block_size);
        }
    }

    /// Rebind a slot's target, keeping both sides of the binding in sync.
    ///
    /// Binding to the target the slot already has is a no-op. A binding
    /// that would close a modulation cycle through amount parameters is
    /// refused and leaves the slot unbound.
    pub fn reassign_target(
        &mut self,
        registry: &mut ParamRegistry,
        slot: usize,
        new_target: Option<ParamHandle>,
    ) {
        debug_assert!(slot < self.slots.len());
        if slot >= self.slots.len() {
            return;
        }

        let current = self.slots[slot].target();
        if current == new_target {
            return;
        }

        if let Some(handle) = current {
            registry.remove_modulation(handle, slot);
        }

        let applied = match new_target {
            None => None,
            Some(handle) => {
                if self.would_cycle(slot, handle) {
                    log::warn!(
                        "binding slot {} to {:?} would close a modulation cycle; leaving it unbound",
                        slot,
                        registry.param(handle).id()
                    );
                    None
                } else {
                    registry.with_modulation(handle, slot);
                    Some(handle)
                }
            }
        };

        self.slots[slot].set_target(applied);
        self.rebuild_eval_order();
    }

    /// Apply a normalized target-choice value from a host control.
    pub fn apply_target_choice(
        &mut self,
        registry: &mut ParamRegistry,
        slot: usize,
        normalized: f32,
    ) {
        let index = choice_index(normalized, self.targets.len());
        let new_target = self.targets.get(index).copied().flatten();
        if index != 0 && new_target.is_none() {
            log::warn!(
                "target choice {} for slot {} has no parameter; unbinding",
                index,
                slot
            );
        }
        self.reassign_target(registry, slot, new_target);
    }

    /// Apply a normalized source-choice value from a host control.
    pub fn apply_source_choice(&mut self, slot: usize, catalogue_len: usize, normalized: f32) {
        debug_assert!(slot < self.slots.len());
        if slot >= self.slots.len() || catalogue_len == 0 {
            return;
        }
        self.slots[slot].rebind(choice_index(normalized, catalogue_len));
    }

    /// The slot whose amount parameter is `handle`, if any.
    fn slot_owning_amount(&self, handle: ParamHandle) -> Option<usize> {
        self.slots.iter().position(|s| s.amount() == handle)
    }

    /// Would binding `slot` to `target` close a cycle through amounts?
    ///
    /// Each slot has at most one target, so the amount-dependency graph has
    /// out-degree one and the check is a chain walk: follow "targets the
    /// amount of" links from the proposed target's owner and see whether
    /// they lead back to `slot`. The walk is bounded because the existing
    /// graph is acyclic.
    fn would_cycle(&self, slot: usize, target: ParamHandle) -> bool {
        let mut current = match self.slot_owning_amount(target) {
            None => return false, // ordinary parameter, cycles impossible
            Some(owner) => owner,
        };
        let mut steps = 0;
        loop {
            if current == slot {
                return true;
            }
            match self.slots[current]
                .target()
                .and_then(|h| self.slot_owning_amount(h))
            {
                Some(next) => current = next,
                None => return false,
            }
            steps += 1;
            if steps > self.slots.len() {
                debug_assert!(false, "cycle in supposedly acyclic amount graph");
                return true;
            }
        }
    }

    /// Chain length from a slot through successive amount targets.
    fn chain_depth(&self, slot: usize) -> usize {
        let mut depth = 0;
        let mut current = slot;
        while let Some(next) = self.slots[current]
            .target()
            .and_then(|h| self.slot_owning_amount(h))
        {
            depth += 1;
            current = next;
            if depth > self.slots.len() {
                debug_assert!(false, "cycle in supposedly acyclic amount graph");
                break;
            }
        }
        depth
    }

    /// Recompute the evaluation order: deepest amount-chains first, ties by
    /// slot index. Stable across blocks, only changes on reassignment.
    fn rebuild_eval_order(&mut self) {
        let mut order = std::mem::take(&mut self.eval_order);
        for (i, entry) in order.iter_mut().enumerate() {
            *entry = i;
        }
        order.sort_unstable_by_key(|&i| (Reverse(self.chain_depth(i)), i));
        self.eval_order = order;
    }
}
