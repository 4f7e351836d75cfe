//! Blocking line pump feeding an [`ActuatorInterpreter`].
//!
//! Works over any [`BufRead`]: a serial port wrapped in a `BufReader`, stdin,
//! or a byte slice in tests.  Read timeouts are expected on serial ports and
//! simply re-check the stop flag; bytes that are not valid UTF-8 are replaced
//! rather than aborting the loop.
//!
//! Sources with no read timeout of their own, such as stdin, go through a
//! [`ThreadedReader`] so the stop flag is still noticed.

use std::io::{self, BufRead, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::interpreter::{ActuatorInterpreter, LineOutcome};

/// Counters for one [`serve`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub applied: usize,
    pub rejected: usize,
}

/// Feed lines from `reader` to `interpreter` until EOF or `stop` is set.
///
/// # Errors
///
/// Returns the first I/O error that is not a timeout or an interruption.
pub fn serve<R: BufRead>(
    mut reader: R,
    interpreter: &mut ActuatorInterpreter,
    stop: &AtomicBool,
) -> io::Result<ServeStats> {
    let mut stats = ServeStats::default();
    let mut buf = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("input closed");
                break;
            }
            Ok(_) => {
                // A line cut short by EOF is still processed.
                let line = String::from_utf8_lossy(&buf);
                match interpreter.handle_line(&line) {
                    LineOutcome::Applied(_) => stats.applied += 1,
                    LineOutcome::Rejected => stats.rejected += 1,
                    LineOutcome::Blank => {}
                }
                buf.clear();
            }
            // Partial bytes stay in `buf` until the rest of the line arrives.
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }
    }

    info!(applied = stats.applied, rejected = stats.rejected, "receiver loop finished");
    Ok(stats)
}

const CHUNK: usize = 1024;

/// A [`BufRead`] over a blocking source that is read on a helper thread.
///
/// A read that waits longer than `poll` fails with [`ErrorKind::TimedOut`],
/// which [`serve`] treats as "check the stop flag and try again".  The helper
/// thread ends with the source; it is left blocked if the source never
/// returns.
pub struct ThreadedReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
    pos: usize,
    poll: Duration,
}

impl ThreadedReader {
    pub fn spawn<R: Read + Send + 'static>(mut source: R, poll: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut chunk = [0u8; CHUNK];
            loop {
                let sent = match source.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => tx.send(Ok(chunk[..n].to_vec())),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                };
                if sent.is_err() {
                    break;
                }
            }
        });
        Self {
            rx,
            buf: Vec::new(),
            pos: 0,
            poll,
        }
    }
}

impl Read for ThreadedReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for ThreadedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            match self.rx.recv_timeout(self.poll) {
                Ok(chunk) => {
                    self.buf = chunk?;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, "no input yet"));
                }
                // Source exhausted.
                Err(RecvTimeoutError::Disconnected) => return Ok(&[]),
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    use gate_types::Mode;

    use crate::sim::SimBoard;

    fn interpreter() -> (ActuatorInterpreter, crate::sim::SimMonitor) {
        let (board, monitor) = SimBoard::new().build();
        (ActuatorInterpreter::new(board), monitor)
    }

    #[test]
    fn serves_lines_until_eof() {
        let (mut interp, monitor) = interpreter();
        let input = Cursor::new("L\nNUMERO_3\n\nbogus\nMODO_AUTO\nFUEGO_2_ON");
        let stats = serve(input, &mut interp, &AtomicBool::new(false)).unwrap();

        assert_eq!(stats, ServeStats { applied: 4, rejected: 1 });
        assert_eq!(interp.state().mode, Mode::Automatic);
        assert_eq!(monitor.door.duty_now(), 4915);
        assert_eq!(monitor.pump_states(), vec![false, true, false, false, false]);
    }

    #[test]
    fn invalid_utf8_is_rejected_not_fatal() {
        let (mut interp, _monitor) = interpreter();
        let input: &[u8] = b"\xff\xfe\nNUMERO_1\n";
        let stats = serve(input, &mut interp, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats, ServeStats { applied: 1, rejected: 1 });
    }

    #[test]
    fn stop_flag_ends_loop_before_reading() {
        let (mut interp, _monitor) = interpreter();
        let stats = serve(Cursor::new("L\n"), &mut interp, &AtomicBool::new(true)).unwrap();
        assert_eq!(stats, ServeStats::default());
    }

    /// Reader that times out once in the middle of a line.
    struct Stutter {
        chunks: Vec<io::Result<&'static [u8]>>,
    }

    impl Read for Stutter {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    out[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn timeouts_are_tolerated_mid_line() {
        let (mut interp, _monitor) = interpreter();
        let reader = BufReader::new(Stutter {
            chunks: vec![
                Ok(b"NUME"),
                Err(io::Error::new(ErrorKind::TimedOut, "quiet line")),
                Ok(b"RO_2\n"),
            ],
        });
        let stats = serve(reader, &mut interp, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(interp.state().manual_pump, 2);
    }

    /// Yields one chunk, then blocks until the test drops its sender.
    struct Hanging {
        first: Option<&'static [u8]>,
        gate: mpsc::Receiver<()>,
    }

    impl Read for Hanging {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if let Some(bytes) = self.first.take() {
                out[..bytes.len()].copy_from_slice(bytes);
                return Ok(bytes.len());
            }
            let _ = self.gate.recv();
            Ok(0)
        }
    }

    #[test]
    fn stop_flag_ends_a_blocked_threaded_read_and_outputs_clear() {
        let (mut interp, monitor) = interpreter();
        let (gate_tx, gate_rx) = mpsc::channel();
        let reader = ThreadedReader::spawn(
            Hanging {
                first: Some(b"NUMERO_2\nV\n"),
                gate: gate_rx,
            },
            Duration::from_millis(20),
        );
        let stop = std::sync::Arc::new(AtomicBool::new(false));
        let setter = {
            let stop = stop.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                stop.store(true, Ordering::SeqCst);
            })
        };

        let stats = serve(reader, &mut interp, &stop).unwrap();
        setter.join().unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(monitor.pump_states(), vec![false, true, false, false, false]);

        interp.shutdown().unwrap();
        assert!(monitor.pump_states().iter().all(|on| !on));
        assert!(!monitor.indicator.state_now());
        drop(gate_tx);
    }

    #[test]
    fn threaded_reader_reports_end_of_source() {
        let (mut interp, _monitor) = interpreter();
        let reader = ThreadedReader::spawn(Cursor::new("L\nO\n"), Duration::from_millis(20));
        let stats = serve(reader, &mut interp, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats, ServeStats { applied: 2, rejected: 0 });
    }

    #[test]
    fn hard_io_errors_propagate() {
        let (mut interp, _monitor) = interpreter();
        let reader = BufReader::new(Stutter {
            chunks: vec![Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))],
        });
        assert!(serve(reader, &mut interp, &AtomicBool::new(false)).is_err());
    }
}
