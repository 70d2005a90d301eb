//! Graph change listeners
//!
//! Listeners run before and after every pass. Each one is independent and
//! best-effort: an error is logged and the remaining listeners still run.

use tracing::error;

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback run around a pass
pub type GraphChangeListener = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Ordered list of listeners
#[derive(Default)]
pub struct GraphChangeListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, GraphChangeListener)>,
}

impl GraphChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: GraphChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn register_all(
        &mut self,
        listeners: impl IntoIterator<Item = GraphChangeListener>,
    ) -> Vec<ListenerId> {
        listeners.into_iter().map(|l| self.register(l)).collect()
    }

    /// Returns false if the listener was not registered
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let len_before = self.listeners.len();
        self.listeners.retain(|(each, _)| *each != id);
        self.listeners.len() != len_before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs every listener in registration order
    pub fn fire_all(&mut self) {
        for (id, listener) in self.listeners.iter_mut() {
            if let Err(e) = listener() {
                error!(listener = id.0, "error executing graph change listener: {:#}", e);
            }
        }
    }
}

impl std::fmt::Debug for GraphChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphChangeListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
