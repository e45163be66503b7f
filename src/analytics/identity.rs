use std::collections::HashSet;

/// Track identities observed during one session. Only grows until the session
/// is discarded.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    seen: HashSet<u64>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconfirmed tracks arrive without an identity and are ignored here;
    /// they still count toward the live total of their frame.
    pub fn observe(&mut self, identity: Option<u64>) {
        if let Some(id) = identity {
            self.seen.insert(id);
        }
    }

    pub fn size(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, identity: u64) -> bool {
        self.seen.contains(&identity)
    }
}
