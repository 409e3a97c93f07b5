use object::Handle;

/// What `LOAD_NAME` does with a name bound nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnboundNamePolicy {
    /// Raise `UnboundName`.
    #[default]
    Raise,
    /// Push this cell instead and log a warning.
    Fallback(Handle),
}

pub const MAX_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub unbound_names: UnboundNamePolicy,
    /// Calls that would push frame number `max_frames + 1` raise
    /// `RecursionLimit`.
    pub max_frames: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            unbound_names: UnboundNamePolicy::Raise,
            max_frames: MAX_FRAMES,
        }
    }
}

impl VmConfig {
    pub fn with_unbound_names(mut self, policy: UnboundNamePolicy) -> Self {
        self.unbound_names = policy;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }
}
