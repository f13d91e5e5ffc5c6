use super::parameter::ModParam;

/// Opaque handle into the registry arena.
///
/// Handles are only minted by [`ParamRegistry::attach`] and stay valid for
/// the registry's whole lifetime; parameters are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamHandle(u16);

impl ParamHandle {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena of modulatable parameters with a string-id side table.
///
/// String lookups binary-search a sorted table instead of hashing, so the
/// control path never pays per-character hashing for ids it resolves
/// repeatedly. The set is fixed once the engine is built; `attach` is a
/// layout-time operation.
pub struct ParamRegistry {
    params: Vec<ModParam>,
    by_id: Vec<(String, ParamHandle)>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            by_id: Vec::new(),
        }
    }

    /// Add a parameter and return its handle.
    ///
    /// Attaching an id twice returns the existing handle and drops the new
    /// parameter.
    pub fn attach(&mut self, param: ModParam) -> ParamHandle {
        match self
            .by_id
            .binary_search_by(|(id, _)| id.as_str().cmp(param.id()))
        {
            Ok(pos) => {
                log::warn!("parameter id {:?} attached twice", param.id());
                self.by_id[pos].1
            }
            Err(pos) => {
                debug_assert!(self.params.len() < u16::MAX as usize);
                let handle = ParamHandle(self.params.len() as u16);
                self.by_id.insert(pos, (param.id().to_owned(), handle));
                self.params.push(param);
                handle
            }
        }
    }

    /// Resolve a stable string id to a handle.
    pub fn lookup(&self, id: &str) -> Option<ParamHandle> {
        self.by_id
            .binary_search_by(|(key, _)| key.as_str().cmp(id))
            .ok()
            .map(|pos| self.by_id[pos].1)
    }

    #[inline]
    pub fn param(&self, handle: ParamHandle) -> &ModParam {
        &self.params[handle.index()]
    }

    #[inline]
    pub fn param_mut(&mut self, handle: ParamHandle) -> &mut ModParam {
        &mut self.params[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Handles in attach order.
    pub fn handles(&self) -> impl Iterator<Item = ParamHandle> {
        (0..self.params.len() as u16).map(ParamHandle)
    }

    pub(crate) fn params_mut(&mut self) -> impl Iterator<Item = &mut ModParam> {
        self.params.iter_mut()
    }

    /// Record that `slot` modulates the parameter behind `handle`.
    /// Router bookkeeping only.
    pub(crate) fn with_modulation(&mut self, handle: ParamHandle, slot: usize) {
        self.params[handle.index()].with_modulation(slot);
    }

    /// Remove `slot` from the parameter's back-reference set.
    /// Router bookkeeping only.
    pub(crate) fn remove_modulation(&mut self, handle: ParamHandle, slot: usize) {
        self.params[handle.index()].remove_modulation(slot);
    }

    /// Fan `prepare` out to every parameter. Not audio-safe.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) {
        for param in &mut self.params {
            param.prepare(sample_rate, block_size);
        }
    }
}

impl Default for ParamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
