use std::io::{ErrorKind, Write};

use anyhow::{anyhow, Context, Result};

use super::{ActuatorLink, Command, RetryPolicy, SERIAL_TIMEOUT};
use crate::config::ActuatorSettings;

/// Serial port link to the rig's microcontroller.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
    path: String,
    write_retry: RetryPolicy,
}

impl SerialLink {
    /// Open the port (with retries), then wait out the board reset before first use.
    pub fn open(settings: &ActuatorSettings) -> Result<Self> {
        let port = settings.open_retry.run("open serial port", || {
            serialport::new(&settings.port, settings.baud)
                .timeout(SERIAL_TIMEOUT)
                .open()
                .with_context(|| format!("open serial port {}", settings.port))
        })?;
        if !settings.settle.is_zero() {
            log::info!(
                "SerialLink: waiting {:?} for {} to settle",
                settings.settle,
                settings.port
            );
            std::thread::sleep(settings.settle);
        }
        log::info!(
            "SerialLink: connected to {} at {} baud",
            settings.port,
            settings.baud
        );
        Ok(Self {
            port,
            path: settings.port.clone(),
            write_retry: settings.write_retry,
        })
    }
}

impl ActuatorLink for SerialLink {
    fn describe(&self) -> String {
        self.path.clone()
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let line = command.encode();
        write_line(&mut self.port, line.as_bytes(), &self.write_retry)
            .with_context(|| format!("write {:?} to {}", command, self.path))
    }
}

/// Write one command line, retrying failed attempts from the first unwritten
/// byte so a timed-out partial write is completed rather than repeated.
fn write_line<W: Write + ?Sized>(writer: &mut W, line: &[u8], retry: &RetryPolicy) -> Result<()> {
    let mut written = 0;
    retry.run("serial write", || {
        while written < line.len() {
            match writer.write(&line[written..]) {
                Ok(0) => return Err(anyhow!("port accepted no bytes")),
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("{}/{} bytes written", written, line.len())))
                }
            }
        }
        writer.flush().context("flush serial port")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    /// Accepts at most `chunk` bytes per call and times out on selected calls.
    struct ChoppyPort {
        wire: Vec<u8>,
        chunk: usize,
        calls: usize,
        time_out_on: Vec<usize>,
    }

    impl Write for ChoppyPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.time_out_on.contains(&self.calls) {
                return Err(io::Error::new(ErrorKind::TimedOut, "timed out"));
            }
            let n = buf.len().min(self.chunk);
            self.wire.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn timed_out_partial_write_resumes_where_it_stopped() -> Result<()> {
        let mut port = ChoppyPort {
            wire: Vec::new(),
            chunk: 3,
            calls: 0,
            time_out_on: vec![2],
        };
        let retry = RetryPolicy::new(2, Duration::ZERO);
        write_line(&mut port, Command::Shake.encode().as_bytes(), &retry)?;
        write_line(&mut port, b"64,32\n", &retry)?;
        assert_eq!(port.wire, b"SHAKE\n64,32\n");
        Ok(())
    }

    #[test]
    fn write_gives_up_after_retries() {
        let mut port = ChoppyPort {
            wire: Vec::new(),
            chunk: 2,
            calls: 0,
            time_out_on: vec![2, 3],
        };
        let retry = RetryPolicy::new(2, Duration::ZERO);
        assert!(write_line(&mut port, b"RESET\n", &retry).is_err());
        assert_eq!(port.wire, b"RE");
    }
}
