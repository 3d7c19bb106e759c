//! The processing loop: control-event batches in, published views out,
//! one JSON line each way.
//!
//! Each input line carries one batch of control events (one user action);
//! the session applies it and the recomputed views are written back as a
//! single JSON object keyed by output identifier. A malformed line is
//! answered with an error placeholder under `"input"` and the loop goes
//! on; only an input transport failure ends it.

use std::error::Error;
use std::io;
use std::sync::mpsc::{Receiver, Sender};

use serde_json::{Map, Value};

use crate::chart::ChartDescription;
use crate::session::{ControlEvent, Session};

pub struct Streamer<In, Out, Err>
where
    In: Iterator<Item = Result<String, Err>>,
    Out: FnMut(String),
{
    events: In,
    write: Out,
}

impl<In, Out, Err> Streamer<In, Out, Err>
where
    In: Iterator<Item = Result<String, Err>>,
    Out: FnMut(String),
    Err: Error + 'static,
{
    pub fn new(events: In, write: Out) -> Self {
        Self { events, write }
    }

    /// Runs the loop until the event source ends.
    pub fn run(
        mut streamer: Streamer<In, Out, Err>,
        session: &mut Session,
    ) -> Result<(), Box<dyn Error>> {
        for input in streamer.events {
            let line = input?;
            let views = match serde_json::from_str::<Vec<ControlEvent>>(&line) {
                Ok(batch) => session.apply(&batch),
                Err(reason) => vec![(
                    "input".to_string(),
                    ChartDescription::failed("input", reason.to_string()),
                )],
            };
            let output = serialize_views(&views)?;
            (streamer.write)(output);
        }
        Ok(())
    }
}

fn serialize_views(views: &[(String, ChartDescription)]) -> Result<String, Box<dyn Error>> {
    let mut map = Map::new();
    for (output, chart) in views {
        map.insert(output.clone(), serde_json::to_value(chart)?);
    }
    Ok(Value::Object(map).to_string())
}

/// The stdin/stdout pair for the interactive loop.
pub fn stdio() -> (
    impl Iterator<Item = Result<String, std::io::Error>>,
    impl FnMut(String),
) {
    let events = io::stdin().lines();
    let write = |views: String| println!("{}", views);
    (events, write)
}

/// Bridges the service channels into the streamer interfaces.
pub fn channels(
    events: Receiver<String>,
    views: Sender<String>,
) -> (
    impl Iterator<Item = Result<String, std::io::Error>>,
    impl FnMut(String),
) {
    let events = events.into_iter().map(Ok);
    let write = move |msg: String| {
        if let Err(reason) = views.send(msg) {
            tracing::warn!(%reason, "no view peer listening");
        }
    };
    (events, write)
}
