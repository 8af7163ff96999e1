use eyre::Result;
use serde::Serialize;
use std::future::Future;

/// One result object produced for exactly one input item.
pub trait Report: Send + 'static {
    /// Identifier copied from the item this report was produced for.
    fn id(&self) -> i64;
}

/// The single operation performed per item.
///
/// `run` must always resolve to a report; failures are expressed inside the
/// report, never as an error. `fault` builds the report used when `run`
/// panics.
pub trait Job: Send + Sync + 'static {
    type Item: Send + Sync + 'static;
    type Report: Report;

    fn run(&self, item: &Self::Item) -> impl Future<Output = Self::Report> + Send;

    fn fault(&self, item: &Self::Item, cause: String) -> Self::Report;
}

/// Turns one report into one line of output (without the trailing newline).
pub trait LineEncoder<R>: Send + 'static {
    fn encode(&self, report: &R) -> Result<String>;
}

/// Plain JSON, one object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLines;

impl<R: Serialize> LineEncoder<R> for JsonLines {
    fn encode(&self, report: &R) -> Result<String> {
        Ok(serde_json::to_string(report)?)
    }
}
