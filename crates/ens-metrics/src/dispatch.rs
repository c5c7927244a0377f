use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ens_core::errors::EnsembleError;
#[cfg(feature = "parallel")]
use ens_core::errors::ErrorInfo;
use ens_core::{EnsembleGenerator, Item};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::kind::EnsembleKind;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts describing one finished generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Number of attempts dispatched.
    pub attempts: usize,
    /// Items absorbed across all attempts, chained outputs included.
    pub absorbed: usize,
    /// Worker threads the batch ran on.
    pub workers: usize,
}

/// The kind and item counter, mutated together under one lock.
struct Reducer<'a, P: Item> {
    kind: &'a mut dyn EnsembleKind<P>,
    items_seen: &'a mut usize,
}

struct Attempt<P> {
    index: usize,
    chain: Option<Box<dyn EnsembleGenerator<P>>>,
}

/// Runs a generating protocol up to `repeats` times from one seed item and
/// feeds every successful result into a kind.
///
/// Seed cloning, protocol cloning and reducer mutation are guarded by three
/// separate locks so that jobs only serialize on absorption.
pub struct ParallelEnsembleGenerator<P: Item> {
    protocol: Arc<dyn EnsembleGenerator<P>>,
    repeats: usize,
    n_workers: usize,
    chain: Option<Arc<dyn EnsembleGenerator<P>>>,
    item_lock: Mutex<()>,
    protocol_lock: Mutex<()>,
}

impl<P: Item> ParallelEnsembleGenerator<P> {
    /// Creates a generator; `n_workers == 0` uses every available core.
    pub fn new(protocol: Arc<dyn EnsembleGenerator<P>>, repeats: usize, n_workers: usize) -> Self {
        Self {
            protocol,
            repeats,
            n_workers,
            chain: None,
            item_lock: Mutex::new(()),
            protocol_lock: Mutex::new(()),
        }
    }

    /// Also absorbs every extra output of `producer` after each attempt.
    pub fn with_chain(mut self, producer: Option<Arc<dyn EnsembleGenerator<P>>>) -> Self {
        self.chain = producer;
        self
    }

    /// Runs the batch and blocks until every attempt has finished.
    ///
    /// Failed attempts are logged and contribute nothing. The first error
    /// raised while absorbing aborts the batch.
    pub fn run(
        &self,
        seed: &P,
        kind: &mut dyn EnsembleKind<P>,
        items_seen: &mut usize,
    ) -> Result<BatchOutcome, EnsembleError> {
        let kind_name = kind.name().to_string();
        let work: Vec<Attempt<P>> = (1..=self.repeats)
            .map(|index| Attempt {
                index,
                chain: self.chain.as_ref().map(|producer| producer.clone_boxed()),
            })
            .collect();
        info!(
            kind = %kind_name,
            protocol = self.protocol.name(),
            attempts = work.len(),
            requested_workers = self.n_workers,
            "dispatching ensemble generation"
        );

        let reducer = Mutex::new(Reducer { kind, items_seen });
        let (absorbed, workers) = self.dispatch(work, seed, &reducer, &kind_name)?;
        let items = *lock(&reducer).items_seen;
        info!(
            kind = %kind_name,
            attempts = self.repeats,
            absorbed,
            workers,
            items_in_ensemble = items,
            "ensemble generation finished"
        );
        Ok(BatchOutcome {
            attempts: self.repeats,
            absorbed,
            workers,
        })
    }

    #[cfg(feature = "parallel")]
    fn dispatch(
        &self,
        work: Vec<Attempt<P>>,
        seed: &P,
        reducer: &Mutex<Reducer<'_, P>>,
        kind_name: &str,
    ) -> Result<(usize, usize), EnsembleError> {
        // num_threads(0) lets rayon pick one thread per available core.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers)
            .build()
            .map_err(|err| {
                EnsembleError::Internal(
                    ErrorInfo::new("generator.thread_pool", err.to_string())
                        .with_context("n_workers", self.n_workers.to_string()),
                )
            })?;
        let workers = pool.current_num_threads();
        let results: Result<Vec<usize>, EnsembleError> = pool.install(|| {
            work.into_par_iter()
                .map(|attempt| self.run_attempt(attempt, seed, reducer, kind_name))
                .collect()
        });
        Ok((results?.into_iter().sum(), workers))
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch(
        &self,
        work: Vec<Attempt<P>>,
        seed: &P,
        reducer: &Mutex<Reducer<'_, P>>,
        kind_name: &str,
    ) -> Result<(usize, usize), EnsembleError> {
        let mut absorbed = 0;
        for attempt in work {
            absorbed += self.run_attempt(attempt, seed, reducer, kind_name)?;
        }
        Ok((absorbed, 1))
    }

    fn run_attempt(
        &self,
        attempt: Attempt<P>,
        seed: &P,
        reducer: &Mutex<Reducer<'_, P>>,
        kind_name: &str,
    ) -> Result<usize, EnsembleError> {
        let Attempt { index, mut chain } = attempt;
        let mut item = {
            let _guard = lock(&self.item_lock);
            seed.clone()
        };
        let mut protocol = {
            let _guard = lock(&self.protocol_lock);
            self.protocol.clone_boxed()
        };

        let mut absorbed = 0;
        let mut sub_index = 0usize;
        loop {
            if protocol.apply(&mut item).is_success() {
                let mut guard = lock(reducer);
                let ordinal = *guard.items_seen + 1;
                guard.kind.absorb(&item, ordinal)?;
                *guard.items_seen = ordinal;
                absorbed += 1;
                debug!(
                    kind = %kind_name,
                    attempt = index,
                    sub_index,
                    ordinal,
                    "absorbed generated item"
                );
            } else if chain.is_some() {
                warn!(
                    kind = %kind_name,
                    attempt = index,
                    sub_index,
                    "generation attempt failed; skipping"
                );
            } else {
                warn!(kind = %kind_name, attempt = index, "generation attempt failed; skipping");
            }

            let Some(producer) = chain.as_mut() else {
                break;
            };
            let next = {
                let _guard = lock(&self.item_lock);
                producer.additional_output()
            };
            match next {
                Some(next) => {
                    item = next;
                    sub_index += 1;
                }
                None => break,
            }
        }
        Ok(absorbed)
    }
}
