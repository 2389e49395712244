mod styling;
mod tables;

use std::io::{self, Stdout, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::octane::{CiEvent, EventSink, TestResultsQueue};

pub use styling::{paint, Tone};
pub use tables::{create_table, pipelines_table, result_cell, transition_cell};

/// Prints the bridge banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        paint("⇄ gocd-octane", Tone::Heading),
        paint(env!("CARGO_PKG_VERSION"), Tone::Muted),
        paint("GoCD stage to Octane pipeline event bridge", Tone::Muted)
    );
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Writes `value` as JSON to `output`, or to stdout when no path is given.
pub fn emit_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = to_json(value, pretty)?;

    if let Some(output_path) = output {
        std::fs::write(output_path, json)?;
        info!("Output written to: {}", output_path.display());
    } else {
        println!("{json}");
    }

    Ok(())
}

/// Event sink that writes every event as one JSON document per line instead
/// of sending it anywhere. Used for dry runs.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
    pretty: bool,
    queue: Arc<TestResultsQueue>,
}

impl JsonLinesSink<Stdout> {
    pub fn stdout(pretty: bool) -> Self {
        Self::new(io::stdout(), pretty)
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W, pretty: bool) -> Self {
        Self {
            out: Mutex::new(out),
            pretty,
            queue: Arc::new(TestResultsQueue::new()),
        }
    }

    pub fn test_results_queue(&self) -> Arc<TestResultsQueue> {
        Arc::clone(&self.queue)
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn publish_event(&self, event: CiEvent) -> Result<()> {
        let json = to_json(&event, self.pretty)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }

    async fn enqueue_test_results_pull(&self, pipeline: &str, counter: &str) -> Result<()> {
        self.queue.enqueue(pipeline, counter);
        Ok(())
    }
}
