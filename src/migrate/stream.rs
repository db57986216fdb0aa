use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use uuid::Uuid;

use crate::engine::{KeyValue, SourceStore, TargetEngine, TargetStore};
use crate::error::{Result, UpgradeError};
use crate::migrate::cancel::CancelToken;
use crate::report::Reporter;
use crate::store::STAGING_PREFIX;

const HANDOFF_CAPACITY: usize = 1;

/// One store's worth of work.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub source: PathBuf,
    /// Where the new store is written. Not created until the consumer starts.
    pub staging: PathBuf,
    pub cancel: CancelToken,
}

impl MigrationJob {
    pub fn new(repo_root: &Path, source: &Path, cancel: CancelToken) -> Self {
        let staging = repo_root.join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()));
        Self {
            source: source.to_path_buf(),
            staging,
            cancel,
        }
    }

    fn cancelled(&self) -> UpgradeError {
        UpgradeError::Cancelled {
            path: self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    pub entries: u64,
}

enum Handoff {
    Entry(KeyValue),
    End,
}

/// Copy every pair from `source` into a new store at `job.staging` under one commit.
///
/// A producer thread scans the source and hands owned copies to a consumer thread over a
/// channel with room for one pending item. The consumer commits only after the producer's
/// end marker arrives.
///
/// On any failure the run's cancel token is raised, the new store's transaction is
/// discarded, and the staging directory is left where it is.
pub fn migrate(
    job: &MigrationJob,
    source: Box<dyn SourceStore>,
    target: &dyn TargetEngine,
    progress_every: u64,
    reporter: &dyn Reporter,
) -> Result<MigrationStats> {
    let (tx, rx) = sync_channel(HANDOFF_CAPACITY);

    let (produced, consumed) = thread::scope(|s| {
        let producer = s.spawn(move || produce(job, source, tx));
        let consumer = s.spawn(move || consume(job, target, rx, progress_every, reporter));
        (
            producer.join().unwrap_or_else(|p| std::panic::resume_unwind(p)),
            consumer.join().unwrap_or_else(|p| std::panic::resume_unwind(p)),
        )
    });

    match (produced, consumed) {
        (Ok(_), Ok(entries)) => Ok(MigrationStats { entries }),
        (Err(err), _) if !err.is_cancelled() => Err(err),
        (_, Err(err)) if !err.is_cancelled() => Err(err),
        (Err(err), _) | (_, Err(err)) => Err(err),
    }
}

fn hand_off(tx: &SyncSender<Handoff>, item: Handoff, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    // Blocks while the consumer holds the previous item; fails once it has hung up.
    tx.send(item).is_ok()
}

fn produce(job: &MigrationJob, mut source: Box<dyn SourceStore>, tx: SyncSender<Handoff>) -> Result<u64> {
    let mut sent = 0u64;
    let scanned = source.scan(&mut |key, value| {
        if hand_off(&tx, Handoff::Entry(KeyValue::copied(key, value)), &job.cancel) {
            sent += 1;
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    });

    let result = match scanned {
        Ok(ControlFlow::Continue(())) if hand_off(&tx, Handoff::End, &job.cancel) => Ok(sent),
        Ok(_) => Err(job.cancelled()),
        Err(err) => {
            job.cancel.cancel();
            Err(UpgradeError::store(&job.source, err))
        }
    };
    drop(tx);

    match (result, source.close()) {
        (Ok(sent), Ok(())) => Ok(sent),
        (Ok(_), Err(err)) => {
            job.cancel.cancel();
            Err(UpgradeError::store(&job.source, err))
        }
        (Err(err), close) => {
            if let Err(close_err) = close {
                log::debug!("closing {} after failure: {close_err}", job.source.display());
            }
            Err(err)
        }
    }
}

fn consume(
    job: &MigrationJob,
    target: &dyn TargetEngine,
    rx: Receiver<Handoff>,
    progress_every: u64,
    reporter: &dyn Reporter,
) -> Result<u64> {
    let fail = |err: UpgradeError| {
        job.cancel.cancel();
        err
    };

    fs::create_dir(&job.staging).map_err(|e| fail(UpgradeError::io(&job.staging, e)))?;
    let mut store = target
        .create(&job.staging)
        .map_err(|e| fail(UpgradeError::store(&job.staging, e)))?;

    let written = write_all(job, store.as_mut(), &rx, progress_every, reporter).map_err(fail);
    drop(rx);

    match (written, store.close()) {
        (Ok(n), Ok(())) => Ok(n),
        (Ok(_), Err(err)) => Err(fail(UpgradeError::store(&job.staging, err))),
        (Err(err), close) => {
            if let Err(close_err) = close {
                log::debug!("closing {} after failure: {close_err}", job.staging.display());
            }
            Err(err)
        }
    }
}

fn write_all(
    job: &MigrationJob,
    store: &mut dyn TargetStore,
    rx: &Receiver<Handoff>,
    progress_every: u64,
    reporter: &dyn Reporter,
) -> Result<u64> {
    let mut txn = store
        .begin()
        .map_err(|e| UpgradeError::store(&job.staging, e))?;
    reporter.note(&format!("Moving data to {}", job.staging.display()));

    let mut written = 0u64;
    loop {
        if job.cancel.is_cancelled() {
            return Err(job.cancelled());
        }
        match rx.recv() {
            Ok(Handoff::Entry(kv)) => {
                txn.put(&kv.key, &kv.value)
                    .map_err(|e| UpgradeError::store(&job.staging, e))?;
                written += 1;
                if progress_every > 0 && written % progress_every == 0 {
                    reporter.progress(written);
                }
            }
            Ok(Handoff::End) => break,
            // Producer gave up without an end marker.
            Err(_) => return Err(job.cancelled()),
        }
    }
    if job.cancel.is_cancelled() {
        return Err(job.cancelled());
    }

    reporter.note(&format!("{written} entries done"));
    reporter.note("Committing transaction");
    txn.commit()
        .map_err(|e| UpgradeError::store(&job.staging, e))?;
    Ok(written)
}
