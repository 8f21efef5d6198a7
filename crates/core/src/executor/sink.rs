//! Streaming output sinks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Receives standard-output chunks as a process produces them.
///
/// Returning an error or panicking never affects the running process:
/// errors are logged, and a panicking sink is disabled for the rest of the
/// run.
pub trait OutputSink: Send {
    fn on_chunk(&mut self, chunk: &str) -> anyhow::Result<()>;
}

impl<F> OutputSink for F
where
    F: FnMut(&str) -> anyhow::Result<()> + Send,
{
    fn on_chunk(&mut self, chunk: &str) -> anyhow::Result<()> {
        self(chunk)
    }
}

/// Wraps an optional sink so that its failures stay contained.
pub(crate) struct GuardedSink<'a> {
    inner: Option<&'a mut dyn OutputSink>,
    program: String,
    errors: usize,
}

impl<'a> GuardedSink<'a> {
    pub(crate) fn new(inner: Option<&'a mut dyn OutputSink>, program: impl Into<String>) -> Self {
        Self {
            inner,
            program: program.into(),
            errors: 0,
        }
    }

    pub(crate) fn deliver(&mut self, chunk: &str) {
        let Some(sink) = self.inner.as_mut() else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| sink.on_chunk(chunk))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.errors += 1;
                warn!("Output sink for {} returned an error: {}", self.program, e);
            }
            Err(_) => {
                warn!(
                    "Output sink for {} panicked; disabling it for the rest of the run",
                    self.program
                );
                self.inner = None;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

/// Decodes a byte stream into UTF-8 text without splitting multi-byte
/// sequences across chunks.
#[derive(Debug, Default)]
pub(crate) struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Decodes as much as possible, carrying an incomplete trailing sequence
    /// over to the next call. Invalid bytes become U+FFFD.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flushes whatever is left at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).to_string();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_carries_split_sequence() {
        let bytes = "héllo".as_bytes();
        let mut chunker = Utf8Chunker::default();

        let first = chunker.push(&bytes[..2]);
        assert_eq!(first, "h");
        let second = chunker.push(&bytes[2..]);
        assert_eq!(second, "éllo");
        assert_eq!(chunker.finish(), "");
    }

    #[test]
    fn test_chunker_replaces_invalid_bytes() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[b'a', 0xff, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_chunker_finish_flushes_incomplete_tail() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[b'x', 0xe2, 0x82]), "x");
        assert_eq!(chunker.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_closure_sink_receives_chunks() {
        let mut seen = Vec::new();
        {
            let mut sink = |chunk: &str| -> anyhow::Result<()> {
                seen.push(chunk.to_string());
                Ok(())
            };
            let mut guarded = GuardedSink::new(Some(&mut sink), "tool");
            guarded.deliver("a");
            guarded.deliver("b");
        }
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_erroring_sink_stays_active() {
        let mut sink = |_: &str| -> anyhow::Result<()> { anyhow::bail!("nope") };
        let mut guarded = GuardedSink::new(Some(&mut sink), "tool");
        guarded.deliver("a");
        guarded.deliver("b");
        assert!(guarded.is_active());
        assert_eq!(guarded.errors, 2);
    }

    #[test]
    fn test_panicking_sink_is_disabled() {
        let mut calls = 0;
        let mut sink = |_: &str| -> anyhow::Result<()> {
            calls += 1;
            panic!("sink exploded");
        };
        {
            let mut guarded = GuardedSink::new(Some(&mut sink), "tool");
            guarded.deliver("a");
            assert!(!guarded.is_active());
            guarded.deliver("b");
        }
        assert_eq!(calls, 1);
    }
}
