use crate::config::EngineOptions;
use crate::dataset::Dataset;
use crate::error::{BuildError, BuildResult};
use crate::index::{Index, IndexBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The result of one build request.
#[derive(Debug)]
pub struct BuildOutcome {
    pub generation: u64,
    pub result: BuildResult<Index>,
}

struct InFlight {
    generation: u64,
    cancel: Arc<AtomicBool>,
    rx: mpsc::Receiver<BuildOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl InFlight {
    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("index worker for generation {} panicked", self.generation);
            }
        }
    }
}

/// Runs index builds on a background thread, one at a time.
///
/// Every request gets a new generation number. Submitting a request cancels the build in flight
/// and drops its result channel, so a superseded build can never deliver its result.
pub struct IndexWorker {
    options: EngineOptions,
    next_generation: u64,
    in_flight: Option<InFlight>,
}

impl IndexWorker {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            next_generation: 0,
            in_flight: None,
        }
    }

    /// Generation of the most recent request (0 before the first one).
    pub fn latest_generation(&self) -> u64 {
        self.next_generation
    }

    pub fn is_building(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start building an index for `dataset`, superseding any build in flight.
    pub fn submit(&mut self, dataset: Arc<Dataset>, columns: Vec<String>) -> u64 {
        self.cancel();

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = Arc::new(AtomicBool::new(false));
        let builder = IndexBuilder::new()
            .with_options(&self.options)
            .with_generation(generation)
            .with_cancel_flag(Arc::clone(&cancel));

        let (tx, rx) = mpsc::channel::<BuildOutcome>();
        let spawned = thread::Builder::new()
            .name(format!("crossfilter-index-{generation}"))
            .spawn(move || {
                let result = builder.build(dataset, &columns);
                if tx.send(BuildOutcome { generation, result }).is_err() {
                    log::debug!("index generation {generation} finished after it was superseded");
                }
            });

        // If the thread could not be spawned its sender is already gone and the next receive
        // reports `WorkerLost`.
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("failed to spawn index worker for generation {generation}: {err}");
                None
            }
        };

        self.in_flight = Some(InFlight {
            generation,
            cancel,
            rx,
            handle,
        });
        generation
    }

    /// The finished build, if the one in flight has completed.
    pub fn try_recv(&mut self) -> Option<BuildOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let outcome = match in_flight.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => BuildOutcome {
                generation: in_flight.generation,
                result: Err(BuildError::WorkerLost),
            },
        };
        self.finish();
        Some(outcome)
    }

    /// Block until the build in flight completes. `None` when nothing is in flight.
    pub fn recv(&mut self) -> Option<BuildOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let outcome = in_flight.rx.recv().unwrap_or(BuildOutcome {
            generation: in_flight.generation,
            result: Err(BuildError::WorkerLost),
        });
        self.finish();
        Some(outcome)
    }

    /// Cancel the build in flight and wait for its thread to stop. Its result is discarded.
    pub fn cancel(&mut self) {
        if let Some(mut in_flight) = self.in_flight.take() {
            in_flight.cancel.store(true, Ordering::Relaxed);
            log::debug!("cancelling index generation {}", in_flight.generation);
            in_flight.join();
        }
    }

    fn finish(&mut self) {
        if let Some(mut in_flight) = self.in_flight.take() {
            in_flight.join();
        }
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Cell;

    fn dataset(rows: u64) -> Arc<Dataset> {
        let mut dataset = Dataset::new(vec!["n"]).unwrap();
        for id in 1..=rows {
            dataset.push_row(id, vec![Cell::Number(id as f64)]).unwrap();
        }
        Arc::new(dataset)
    }

    #[test]
    fn generations_increase_per_request() {
        let mut worker = IndexWorker::new(EngineOptions::default());
        assert_eq!(worker.latest_generation(), 0);
        let first = worker.submit(dataset(3), vec!["n".into()]);
        let second = worker.submit(dataset(4), vec!["n".into()]);
        assert_eq!((first, second), (1, 2));

        let outcome = worker.recv().unwrap();
        assert_eq!(outcome.generation, 2);
        assert_eq!(outcome.result.unwrap().row_count(), 4);
        assert!(worker.recv().is_none());
    }

    #[test]
    fn failures_are_reported_with_their_generation() {
        let mut worker = IndexWorker::new(EngineOptions::default());
        let generation = worker.submit(dataset(0), vec!["n".into()]);
        let outcome = worker.recv().unwrap();
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.result.unwrap_err(), BuildError::EmptyDataset);
        assert!(!worker.is_building());
    }

    #[test]
    fn cancel_discards_the_result() {
        let mut worker = IndexWorker::new(EngineOptions::default());
        worker.submit(dataset(10), vec!["n".into()]);
        worker.cancel();
        assert!(!worker.is_building());
        assert!(worker.try_recv().is_none());
    }
}
