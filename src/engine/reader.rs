//! Input reader thread for the blocking backends.
//!
//! A blocking `read_until` cannot be interrupted, so the read runs on its
//! own thread and hands lines over a bounded channel. The engine selects
//! on that channel and on the shutdown listener, which lets an interrupt
//! start the drain while the input is open but idle. A reader left parked
//! on such an input is detached, never joined.

use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver};

use crate::lifecycle::Shutdown;

use super::EngineError;

/// What the engine should do next.
#[derive(Debug)]
pub(crate) enum Input {
    Line(Vec<u8>),
    Eof,
    Failed(io::Error),
    Shutdown,
}

pub(crate) struct LineFeed {
    lines: Receiver<io::Result<Vec<u8>>>,
    stop: Receiver<()>,
}

impl LineFeed {
    /// Start reading `input` on a dedicated thread.
    pub(crate) fn spawn<R>(input: R, capacity: usize, shutdown: &Shutdown) -> Result<Self, EngineError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = bounded(capacity);
        thread::Builder::new()
            .name("gor-reader".to_string())
            .spawn(move || {
                let mut input = input;
                loop {
                    let mut line = Vec::new();
                    let read = match input.read_until(b'\n', &mut line) {
                        Ok(0) => break,
                        Ok(_) => Ok(line),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let failed = read.is_err();
                    // the engine has stopped listening
                    if tx.send(read).is_err() || failed {
                        break;
                    }
                }
                tracing::debug!("Input reader finished");
            })
            .map_err(EngineError::Reader)?;

        Ok(Self {
            lines,
            stop: shutdown.listener(),
        })
    }

    /// Block until a line, end of input, a read error or shutdown.
    pub(crate) fn next(&self) -> Input {
        // shutdown wins over lines already buffered
        if stopped(&self.stop) {
            return Input::Shutdown;
        }

        select! {
            recv(self.stop) -> _ => Input::Shutdown,
            recv(self.lines) -> read => match read {
                Ok(Ok(line)) => Input::Line(line),
                Ok(Err(e)) => Input::Failed(e),
                Err(_) => Input::Eof,
            },
        }
    }
}

fn stopped(stop: &Receiver<()>) -> bool {
    matches!(stop.try_recv(), Err(crossbeam_channel::TryRecvError::Disconnected))
}
