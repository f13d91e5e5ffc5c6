use crate::params::ParamHandle;

/// A control-rate change, published by the control context and applied by
/// the engine between blocks.
///
/// Events are `Copy` and fixed-size so pushing one never allocates. The
/// audio context drains the queue at the top of `run_block`, which is the
/// only point where bindings change; a half-applied binding is never
/// observable mid-block.
#[derive(Debug, Clone, Copy)]
pub enum ControlEvent {
    /// Normalized target-choice change for a slot.
    SlotTarget { slot: usize, choice: f32 },
    /// Normalized source-choice change for a slot.
    SlotSource { slot: usize, choice: f32 },
    /// New base value (plain units) for a parameter.
    ParamBase { param: ParamHandle, plain: f32 },
}

pub trait EventReceiver {
    fn pop(&mut self) -> Option<ControlEvent>;
}

#[cfg(feature = "rtrb")]
impl EventReceiver for rtrb::Consumer<ControlEvent> {
    fn pop(&mut self) -> Option<ControlEvent> {
        rtrb::Consumer::pop(self).ok()
    }
}

/// Control-side handle for a running engine.
///
/// Wraps the producer half of the SPSC ring. Every method returns whether
/// the event was enqueued; `false` means the ring was full and the event
/// was dropped, in which case the caller may simply send again later;
/// control changes are idempotent.
#[cfg(feature = "rtrb")]
pub struct ControlHandle {
    tx: rtrb::Producer<ControlEvent>,
}

#[cfg(feature = "rtrb")]
impl ControlHandle {
    pub(crate) fn new(tx: rtrb::Producer<ControlEvent>) -> Self {
        Self { tx }
    }

    /// Point a slot at a new target, as a normalized choice value.
    pub fn set_slot_target(&mut self, slot: usize, choice: f32) -> bool {
        self.send(ControlEvent::SlotTarget { slot, choice })
    }

    /// Point a slot at a new source, as a normalized choice value.
    pub fn set_slot_source(&mut self, slot: usize, choice: f32) -> bool {
        self.send(ControlEvent::SlotSource { slot, choice })
    }

    /// Change a parameter's base value in plain units.
    pub fn set_param_base(&mut self, param: ParamHandle, plain: f32) -> bool {
        self.send(ControlEvent::ParamBase { param, plain })
    }

    pub fn send(&mut self, event: ControlEvent) -> bool {
        self.tx.push(event).is_ok()
    }
}
