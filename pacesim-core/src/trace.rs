//! Window-change notifications and the congestion window trace file.
//!
//! A transport connection exposes its congestion window as a
//! [`TracedWindow`]. Any [`WindowObserver`] can subscribe to it and will
//! be called with `(time, old, new)` every time the value changes.
//! [`CongestionTraceSink`] is the observer that writes these records
//! to a tab-separated file:
//!
//! ```text
//! 2.5	1000	2000
//! 2.7	2000	1500
//! ```

use crate::time::SimTime;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use thiserror::Error;

/// Name of the congestion window trace source of a connection.
pub const CONGESTION_WINDOW: &str = "CongestionWindow";

/// Receives window-change notifications.
///
/// Observers are called synchronously from the simulation's event loop
/// and must return promptly.
pub trait WindowObserver {
    fn on_window_change(&mut self, at: SimTime, old: u32, new: u32);
}

impl<F> WindowObserver for F
where
    F: FnMut(SimTime, u32, u32),
{
    fn on_window_change(&mut self, at: SimTime, old: u32, new: u32) {
        self(at, old, new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("No trace source named `{name}'")]
    UnknownSource { name: String },
}

/// A named `u32` value whose changes are reported to observers.
pub struct TracedWindow {
    name: &'static str,
    value: u32,
    observers: Vec<Box<dyn WindowObserver>>,
}

impl TracedWindow {
    pub fn new(name: &'static str, initial: u32) -> Self {
        Self {
            name,
            value: initial,
            observers: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.value
    }

    /// Subscribe `observer` if `name` designates this trace source.
    pub fn connect(
        &mut self,
        name: &str,
        observer: Box<dyn WindowObserver>,
    ) -> Result<(), TraceError> {
        if name != self.name {
            return Err(TraceError::UnknownSource {
                name: name.to_owned(),
            });
        }
        self.observers.push(observer);
        Ok(())
    }

    /// Update the value, notifying the observers in subscription order
    /// if it changed.
    pub fn set(&mut self, at: SimTime, value: u32) {
        let old = std::mem::replace(&mut self.value, value);
        if old == value {
            return;
        }
        for observer in self.observers.iter_mut() {
            observer.on_window_change(at, old, value);
        }
    }
}

/// Appends congestion window changes to a trace output, one
/// `time_seconds \t old_window \t new_window` record per line.
///
/// Trace data is best effort: a record that fails to be written is
/// reported with [`log::warn!`], counted and dropped. The simulation is
/// never interrupted because of the trace.
pub struct CongestionTraceSink<W: Write> {
    out: W,
    written: u64,
    failed: u64,
}

impl CongestionTraceSink<BufWriter<File>> {
    /// Create (or truncate) the trace file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CongestionTraceSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            failed: 0,
        }
    }

    /// number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// number of records that were dropped because of an I/O error
    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn flush(&mut self) {
        if let Err(error) = self.out.flush() {
            log::warn!("Failed to flush the congestion window trace: {error}");
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> WindowObserver for CongestionTraceSink<W> {
    fn on_window_change(&mut self, at: SimTime, old: u32, new: u32) {
        match writeln!(self.out, "{at}\t{old}\t{new}") {
            Ok(()) => self.written += 1,
            Err(error) => {
                self.failed += 1;
                log::warn!("Dropped congestion window record at {at}s ({old} -> {new}): {error}");
            }
        }
    }
}

impl<W: Write> Drop for CongestionTraceSink<W> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    /// an output that refuses every write
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk is gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk is gone"))
        }
    }

    fn output(sink: &CongestionTraceSink<Vec<u8>>) -> &str {
        std::str::from_utf8(sink.get_ref()).unwrap()
    }

    #[test]
    fn writes_records_in_arrival_order() {
        let mut sink = CongestionTraceSink::new(Vec::new());

        sink.on_window_change(SimTime::from_millis(2_500), 1000, 2000);
        sink.on_window_change(SimTime::from_millis(2_700), 2000, 1500);

        assert_eq!(output(&sink), "2.5\t1000\t2000\n2.7\t2000\t1500\n");
        assert_eq!(sink.written(), 2);
        assert_eq!(sink.failed(), 0);
    }

    #[test]
    fn write_failures_are_counted_not_raised() {
        let mut sink = CongestionTraceSink::new(Broken);

        sink.on_window_change(SimTime::from_secs(1), 1, 2);
        sink.on_window_change(SimTime::from_secs(2), 2, 3);
        sink.flush();

        assert_eq!(sink.written(), 0);
        assert_eq!(sink.failed(), 2);
    }

    #[test]
    fn trace_file_is_created_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcp-example.cwnd");
        std::fs::write(&path, "stale content\n").unwrap();

        {
            let mut sink = CongestionTraceSink::create(&path).unwrap();
            sink.on_window_change(SimTime::from_millis(2_500), 1000, 2000);
            sink.on_window_change(SimTime::from_millis(2_700), 2000, 1500);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "2.5\t1000\t2000\n2.7\t2000\t1500\n");
    }

    #[test]
    fn traced_window_notifies_on_change_only() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let mut window = TracedWindow::new(CONGESTION_WINDOW, 100);

        let seen = Rc::clone(&records);
        window
            .connect(
                CONGESTION_WINDOW,
                Box::new(move |at: SimTime, old: u32, new: u32| seen.borrow_mut().push((at, old, new))),
            )
            .unwrap();

        window.set(SimTime::from_secs(1), 200);
        window.set(SimTime::from_secs(2), 200);
        window.set(SimTime::from_secs(3), 50);

        assert_eq!(window.get(), 50);
        assert_eq!(
            *records.borrow(),
            vec![
                (SimTime::from_secs(1), 100, 200),
                (SimTime::from_secs(3), 200, 50),
            ]
        );
    }

    #[test]
    fn observers_run_in_subscription_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut window = TracedWindow::new(CONGESTION_WINDOW, 0);

        for tag in ["first", "second"] {
            let order = Rc::clone(&order);
            window
                .connect(
                    CONGESTION_WINDOW,
                    Box::new(move |_: SimTime, _: u32, _: u32| order.borrow_mut().push(tag)),
                )
                .unwrap();
        }
        window.set(SimTime::ZERO, 1);

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn unknown_source_is_rejected() {
        let mut window = TracedWindow::new(CONGESTION_WINDOW, 0);
        assert_eq!(window.name(), "CongestionWindow");
        let error = window
            .connect("SlowStartThreshold", Box::new(|_: SimTime, _: u32, _: u32| {}))
            .unwrap_err();

        assert_eq!(
            error,
            TraceError::UnknownSource {
                name: "SlowStartThreshold".to_owned()
            }
        );
    }
}
