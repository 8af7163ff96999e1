use crate::job::{
    Job,
    LineEncoder,
    Report,
};
use eyre::{
    Context as _,
    Result,
};
use futures::FutureExt as _;
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::Arc,
};
use tokio::{
    io::{
        AsyncWrite,
        AsyncWriteExt,
    },
    sync::mpsc,
    task::JoinSet,
};
use tracing::{
    debug,
    error,
    info,
};

/// Counters describing one finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items submitted; one report is expected for each.
    pub total: usize,
    /// Reports handed to the consumer.
    pub produced: usize,
    /// Lines written to the output.
    pub written: usize,
    /// Reports that could not be encoded or written.
    pub dropped: usize,
}

/// Runs `job` once per item, all items concurrently, and streams one encoded
/// line per report to `out` in completion order.
///
/// Returns once every producer has finished and the consumer has drained the
/// queue. The writer is handed back to the caller.
pub async fn run<J, E, W>(job: Arc<J>, items: Vec<J::Item>, encoder: E, out: W) -> Result<(W, BatchSummary)>
where
    J: Job,
    E: LineEncoder<J::Report>,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let total = items.len();
    let (sender, receiver) = mpsc::channel::<J::Report>(total.max(1));
    let consumer = tokio::spawn(drain(receiver, encoder, out));

    info!(total, "orchestrator: starting batch");

    let mut producers = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let job = Arc::clone(&job);
        let sender = sender.clone();
        producers.spawn(async move {
            let report = match AssertUnwindSafe(job.run(&item)).catch_unwind().await {
                Ok(report) => report,
                Err(panic) => {
                    let cause = panic_message(panic.as_ref());
                    error!(index, cause = %cause, "orchestrator: task panicked");
                    job.fault(&item, format!("panic recovered: {cause}"))
                }
            };
            let id = report.id();
            debug!(index, id, "orchestrator: task finished");
            if sender.send(report).await.is_err() {
                error!(index, id, "orchestrator: result queue closed before report was queued");
                return false;
            }
            true
        });
    }

    // Every producer must be done before the queue is closed, otherwise
    // late reports are lost.
    let mut produced = 0;
    while let Some(joined) = producers.join_next().await {
        match joined {
            Ok(true) => produced += 1,
            Ok(false) => {}
            Err(err) => error!("orchestrator: producer task failed: {err}"),
        }
    }
    drop(sender);

    let (out, written, dropped) = consumer.await.wrap_err("result consumer failed")?;
    let summary = BatchSummary {
        total,
        produced,
        written,
        dropped,
    };
    info!(?summary, "orchestrator: batch completed");
    Ok((out, summary))
}

async fn drain<R, E, W>(mut receiver: mpsc::Receiver<R>, encoder: E, mut out: W) -> (W, usize, usize)
where
    R: Report,
    E: LineEncoder<R>,
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    let mut dropped = 0;
    while let Some(report) = receiver.recv().await {
        let line = match encoder.encode(&report) {
            Ok(line) => line,
            Err(err) => {
                error!(id = report.id(), "orchestrator: error encoding result: {err:#}");
                dropped += 1;
                continue;
            }
        };
        match write_line(&mut out, &line).await {
            Ok(()) => written += 1,
            Err(err) => {
                error!(id = report.id(), "orchestrator: error writing result: {err:#}");
                dropped += 1;
            }
        }
    }
    (out, written, dropped)
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
