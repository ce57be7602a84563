/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Return the default implementation of [`Output`] that sends:
///
/// * Prints to `stdout`.
/// * Progress Bars to `stderr`.
pub fn default() -> DefaultOutput {
    DefaultOutput::new()
}

/// Where a benchmark run reports to.
///
/// Runs print phase banners and result tables to `sink` and draw progress bars for long
/// query batches to `draw_target`. Hiding both behind a trait lets tests capture or suppress
/// everything a run would otherwise write to the terminal.
pub trait Output {
    fn sink(&mut self) -> &mut dyn std::io::Write;
    fn draw_target(&self) -> ProgressDrawTarget;

    /// Create a progress bar of `len` steps labelled with `message` on this output's draw
    /// target.
    fn progress_bar(&self, len: usize, message: String) -> anyhow::Result<ProgressBar> {
        let progress = ProgressBar::with_draw_target(Some(len as u64), self.draw_target());
        progress.set_style(ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} {per_sec}",
        )?);
        progress.set_message(message);
        Ok(progress)
    }
}

/// This allows `&mut dyn Output` to be used as the receiver of the `write!` macro.
impl std::io::Write for &mut dyn Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sink().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.sink().flush()
    }
}

/// A default output that sends:
///
/// * Prints to `stdout`
/// * Progress Bars to `stderr`.
#[derive(Debug)]
pub struct DefaultOutput(std::io::Stdout);

impl DefaultOutput {
    /// Construct a new [`DefaultOutput`].
    pub fn new() -> Self {
        Self(std::io::stdout())
    }
}

impl Default for DefaultOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for DefaultOutput {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::stderr()
    }
}

/// An output that suppresses all prints and progress bars.
#[derive(Debug)]
pub struct Sink(std::io::Sink);

impl Sink {
    /// Construct a new [`Sink`] output.
    pub fn new() -> Self {
        Self(std::io::sink())
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for Sink {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::hidden()
    }
}

/// Captures prints in a buffer so tests can inspect what a run reported.
///
/// Progress bars are suppressed.
#[derive(Debug)]
pub struct Memory(Vec<u8>);

impl Memory {
    /// Construct a new [`Memory`] with an empty buffer.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Consume `self`, returning everything written to it as (lossy) UTF-8.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for Memory {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::hidden()
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_memory() {
        let mut buf = Memory::new();
        {
            let mut output: &mut dyn Output = &mut buf;
            writeln!(output, "ef = {}", 10).unwrap();
            writeln!(output, "recall = {:.2}", 0.5).unwrap();
            output.flush().unwrap();

            assert!(output.draw_target().is_hidden());
        }
        let message = buf.into_string();
        let mut lines = message.lines();
        assert_eq!(lines.next().unwrap(), "ef = 10");
        assert_eq!(lines.next().unwrap(), "recall = 0.50");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_default() {
        let mut d = default();
        let mut s = &mut d as &mut dyn Output;
        writeln!(s, "test").unwrap();
    }

    #[test]
    fn test_sink() {
        let mut d = Sink::new();
        let mut s = &mut d as &mut dyn Output;

        assert!(s.draw_target().is_hidden());
        writeln!(s, "test").unwrap();
    }

    #[test]
    fn test_progress_bar() {
        let output = Memory::new();
        let progress = output.progress_bar(4, "PLAIN ef=10".into()).unwrap();
        assert_eq!(progress.length(), Some(4));
        assert!(progress.is_hidden());
        progress.inc(4);
        assert_eq!(progress.position(), 4);
        progress.finish();
    }
}
