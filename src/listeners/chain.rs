//! # ChainOfResponsibility: declared participants first
//!
//! Wraps any [`ListenerSource`] and reorders its snapshots so a statically
//! declared participant list comes first, in declared order. Listeners that
//! are not declared follow in the inner source's order, or are dropped when the
//! chain is restricted with [`ChainOfResponsibility::only_participants`].
//!
//! Combined with `Event::set_handled`, this gives a classic chain: the first
//! declared participant that handles the event stops the sequential dispatch.
//!
//! ```text
//! inner snapshot:  [x, c, a, y, b]      participants: [a, b, c]
//! chain snapshot:  [a, b, c, x, y]      only_participants: [a, b, c]
//! ```

use std::sync::Arc;

use crate::error::DispatchError;
use crate::events::Category;
use crate::listeners::{ListenerRegistry, ListenerSource, RegistryId, Snapshot, same_listener};

/// Source decorator placing declared participants first.
pub struct ChainOfResponsibility<L: ?Sized, S> {
    inner: S,
    participants: Vec<Arc<L>>,
    only_participants: bool,
}

impl<L: ?Sized, S: ListenerSource<L>> ChainOfResponsibility<L, S> {
    /// Wraps `inner` with the given participant order.
    pub fn new(inner: S, participants: Vec<Arc<L>>) -> Self {
        Self {
            inner,
            participants,
            only_participants: false,
        }
    }

    /// Drops listeners that are not declared participants from snapshots.
    #[must_use]
    pub fn only_participants(mut self) -> Self {
        self.only_participants = true;
        self
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Declared participants, in chain order.
    pub fn participants(&self) -> &[Arc<L>] {
        &self.participants
    }
}

impl<L, S> ListenerSource<L> for ChainOfResponsibility<L, S>
where
    L: ?Sized + Send + Sync,
    S: ListenerSource<L>,
{
    fn snapshot(&self, category: &Category) -> Snapshot<L> {
        let base = self.inner.snapshot(category);
        let mut taken = vec![false; base.len()];
        let mut ordered: Vec<Arc<L>> = Vec::with_capacity(base.len());

        for participant in &self.participants {
            for (i, listener) in base.iter().enumerate() {
                if !taken[i] && same_listener(participant, listener) {
                    taken[i] = true;
                    ordered.push(Arc::clone(listener));
                }
            }
        }
        if !self.only_participants {
            ordered.extend(
                base.iter()
                    .zip(&taken)
                    .filter(|(_, taken)| !**taken)
                    .map(|(listener, _)| Arc::clone(listener)),
            );
        }
        ordered.into()
    }

    fn is_sequential(&self) -> bool {
        false
    }
}

impl<L, S> ListenerRegistry<L> for ChainOfResponsibility<L, S>
where
    L: ?Sized + Send + Sync,
    S: ListenerRegistry<L>,
{
    fn id(&self) -> RegistryId {
        self.inner.id()
    }

    fn register(&self, category: &Category, listener: Arc<L>) -> Result<(), DispatchError> {
        self.inner.register(category, listener)
    }

    fn register_with_priority(
        &self,
        category: &Category,
        listener: Arc<L>,
        priority: i32,
    ) -> Result<(), DispatchError> {
        self.inner.register_with_priority(category, listener, priority)
    }

    fn unregister(&self, category: &Category, listener: &Arc<L>) -> bool {
        self.inner.unregister(category, listener)
    }

    fn unregister_category(&self, category: &Category) -> usize {
        self.inner.unregister_category(category)
    }

    fn unregister_all(&self) -> usize {
        self.inner.unregister_all()
    }

    fn categories(&self) -> Vec<Category> {
        self.inner.categories()
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::SequentialRegistry;
    use crate::test_support::{Journal, Ping, Probe};

    fn setup() -> (SequentialRegistry<dyn Ping>, Vec<Arc<dyn Ping>>) {
        let journal = Journal::default();
        let reg: SequentialRegistry<dyn Ping> = SequentialRegistry::new();
        let all: Vec<Arc<dyn Ping>> = ["x", "c", "a", "y", "b"]
            .into_iter()
            .map(|label| Probe::new(label, &journal) as Arc<dyn Ping>)
            .collect();
        for l in &all {
            reg.register(&Category::new("req"), Arc::clone(l)).unwrap();
        }
        (reg, all)
    }

    fn names(s: &Snapshot<dyn Ping>) -> Vec<&'static str> {
        s.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn test_participants_first_then_rest() {
        let (reg, all) = setup();
        let participants = vec![all[2].clone(), all[4].clone(), all[1].clone()];
        let chain = ChainOfResponsibility::new(reg, participants);

        assert_eq!(names(&chain.snapshot(&Category::new("req"))), ["a", "b", "c", "x", "y"]);
        assert!(!chain.is_sequential());
    }

    #[test]
    fn test_only_participants_filters() {
        let (reg, all) = setup();
        let chain = ChainOfResponsibility::new(reg, vec![all[4].clone(), all[2].clone()])
            .only_participants();

        assert_eq!(names(&chain.snapshot(&Category::new("req"))), ["b", "a"]);
    }

    #[test]
    fn test_unregistered_participant_is_skipped() {
        let (reg, all) = setup();
        let chain = ChainOfResponsibility::new(reg, vec![all[2].clone(), all[0].clone()]);
        assert!(chain.unregister(&Category::new("req"), &all[2]));

        assert_eq!(names(&chain.snapshot(&Category::new("req"))), ["x", "c", "y", "b"]);
    }
}
