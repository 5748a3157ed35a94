//! Hot-swappable holder for the active genome.
//!
//! Readers take an `Arc<Genome>` snapshot and evaluate against it without
//! holding the lock. A reload replaces the `Arc` under a short write lock;
//! requests already in flight finish on the genome they started with.

use antigone_core::Genome;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared reference to the genome currently in force.
#[derive(Debug, Clone)]
pub struct GenomeStore {
    current: Arc<RwLock<Arc<Genome>>>,
}

impl GenomeStore {
    pub fn new(genome: Genome) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(genome))),
        }
    }

    /// Snapshot of the active genome.
    pub fn current(&self) -> Arc<Genome> {
        self.current.read().clone()
    }

    /// Swap in a new genome and return the one it replaced, running
    /// `on_swap` while the write lock is held.
    ///
    /// Concurrent swaps are serialized, so whatever `on_swap` records about
    /// the incoming genome always describes the genome left in force.
    pub fn replace_with<F>(&self, genome: Genome, on_swap: F) -> Arc<Genome>
    where
        F: FnOnce(&Genome),
    {
        let next = Arc::new(genome);
        let current_hash = next.content_hash().to_string();

        let mut current = self.current.write();
        on_swap(&*next);
        let previous = std::mem::replace(&mut *current, next);
        drop(current);

        tracing::info!(
            previous = %previous.content_hash(),
            current = %current_hash,
            "Genome swapped"
        );
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antigone_core::{Command, Stance};

    const DENY_HARM: &str = "axioms:\n  - id: non_harm\n    stance: deny\n    weight: 1.0\n    match: { keywords: [harm] }\n";
    const ALLOW_HARM: &str = "axioms:\n  - id: harm_ok\n    stance: allow\n    weight: 1.0\n    match: { keywords: [harm] }\n";

    #[test]
    fn test_snapshot_survives_swap() {
        let store = GenomeStore::new(Genome::from_yaml(DENY_HARM).unwrap());
        let snapshot = store.current();

        let previous = store.replace_with(Genome::from_yaml(ALLOW_HARM).unwrap(), |_| {});
        assert_eq!(previous.content_hash(), snapshot.content_hash());

        let cmd = Command::text("harm");
        assert_eq!(snapshot.decide(&cmd).decision, Stance::Deny);
        assert_eq!(store.current().decide(&cmd).decision, Stance::Allow);
        assert_ne!(store.current().content_hash(), snapshot.content_hash());
    }

    #[test]
    fn test_clones_share_state() {
        let store = GenomeStore::new(Genome::from_yaml(DENY_HARM).unwrap());
        let other = store.clone();
        store.replace_with(Genome::from_yaml(ALLOW_HARM).unwrap(), |_| {});
        assert_eq!(other.current().content_hash(), store.current().content_hash());
    }

    #[test]
    fn test_replace_with_runs_under_lock() {
        let store = GenomeStore::new(Genome::from_yaml(DENY_HARM).unwrap());
        let mut seen = None;

        store.replace_with(Genome::from_yaml(ALLOW_HARM).unwrap(), |next| {
            seen = Some(next.content_hash().to_string());
        });
        assert_eq!(seen, Some(store.current().content_hash().to_string()));
    }

    #[test]
    fn test_concurrent_readers() {
        let store = GenomeStore::new(Genome::from_yaml(DENY_HARM).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let genome = store.current();
                    genome.decide(&Command::text("harm")).decision
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Stance::Deny);
        }
    }
}
