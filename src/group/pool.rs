//! Bounded worker pool for founder scans.
//!
//! Each job scores one founder against the whole population. Jobs are fed
//! through a bounded channel to named scoped workers; results come back on an
//! unbounded channel and are handed to the caller strictly in founder order,
//! so the outcome equals a sequential scan.

use std::collections::BTreeMap;
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::debug;

use super::{AssignmentTable, Population};
use crate::compare::CompareContext;
use crate::error::{CompareError, ReclinkError, ReclinkResult};

/// A record scoring at least the near-match threshold against a founder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Hit {
    pub index: usize,
    pub score: f64,
}

/// Result of one founder job.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScanOutcome {
    /// The founder was already assigned when a worker picked the job up.
    Skipped,
    Scanned { hits: Vec<Hit>, mismatches: usize },
}

pub(crate) struct ScanPool<'a> {
    pub population: &'a Population,
    pub ctx: CompareContext<'a>,
    pub near_match: f64,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl ScanPool<'_> {
    /// Scores `founder` against every other record.
    ///
    /// Type mismatches are logged, counted and excluded.
    pub(crate) fn scan(&self, founder: usize) -> ScanOutcome {
        let left = self.population.record(founder);
        let mut hits = Vec::new();
        let mut mismatches = 0;
        for (index, right) in self.population.records().iter().enumerate() {
            if index == founder {
                continue;
            }
            match left.compare(right, &self.ctx) {
                Ok(Some(cmp)) if cmp.score >= self.near_match => hits.push(Hit {
                    index,
                    score: cmp.score,
                }),
                Ok(_) => {}
                Err(CompareError::TypeMismatch { left: l, right: r }) => {
                    mismatches += 1;
                    debug!(
                        founder = %left.key(),
                        other = %right.key(),
                        left_kind = l,
                        right_kind = r,
                        "type mismatch; pair excluded"
                    );
                }
            }
        }
        ScanOutcome::Scanned { hits, mismatches }
    }

    /// Scans `founders` on the pool, calling `apply` once per founder in order.
    ///
    /// # Errors
    /// Returns an error if a worker cannot be spawned or `apply` fails; the
    /// first `apply` error stops further applications.
    pub(crate) fn run<F>(&self, founders: &[usize], table: &AssignmentTable, mut apply: F) -> ReclinkResult<()>
    where
        F: FnMut(usize, ScanOutcome) -> ReclinkResult<()>,
    {
        if founders.is_empty() {
            return Ok(());
        }
        let workers = self.workers.clamp(1, founders.len());
        let queue_capacity = self.queue_capacity.max(1);

        thread::scope(|scope| {
            let (job_tx, job_rx) = bounded::<(usize, usize)>(queue_capacity);
            let (result_tx, result_rx) = unbounded::<(usize, ScanOutcome)>();

            for idx in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("reclink-scan-{idx}"))
                    .spawn_scoped(scope, move || {
                        for (seq, founder) in job_rx.iter() {
                            let outcome = if table.is_assigned(founder).unwrap_or(false) {
                                ScanOutcome::Skipped
                            } else {
                                self.scan(founder)
                            };
                            if result_tx.send((seq, outcome)).is_err() {
                                break;
                            }
                        }
                    });
                if let Err(err) = spawned {
                    // closing the job channel lets already-spawned workers exit
                    drop(job_tx);
                    return Err(ReclinkError::internal(format!("failed to spawn scan worker: {err}")));
                }
            }
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for (seq, &founder) in founders.iter().enumerate() {
                    if job_tx.send((seq, founder)).is_err() {
                        break;
                    }
                }
            });

            let mut pending: BTreeMap<usize, ScanOutcome> = BTreeMap::new();
            let mut next = 0;
            let mut result = Ok(());
            for (seq, outcome) in result_rx.iter() {
                pending.insert(seq, outcome);
                while let Some(outcome) = pending.remove(&next) {
                    if result.is_ok() {
                        result = apply(founders[next], outcome);
                    }
                    next += 1;
                }
            }
            result
        })
    }
}
