//! Serial-port implementation of the device link.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use super::{ChannelCandidate, Command, SensorChannel};
use crate::error::{GrowError, Result};

/// A serial port that may host the enclosure firmware.
#[derive(Debug, Clone)]
pub struct SerialCandidate {
    path: String,
    baud_rate: u32,
}

impl SerialCandidate {
    #[must_use]
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }

    /// All serial ports the operating system reports.
    pub fn enumerate(baud_rate: u32) -> Result<Vec<Self>> {
        let ports = serialport::available_ports()?;
        debug!(count = ports.len(), "Enumerated serial ports");
        Ok(ports
            .into_iter()
            .map(|port| Self::new(port.port_name, baud_rate))
            .collect())
    }
}

impl ChannelCandidate for SerialCandidate {
    fn name(&self) -> &str {
        &self.path
    }

    fn open(&self) -> Result<Box<dyn SensorChannel>> {
        debug!(port = %self.path, baud = self.baud_rate, "Opening serial port");
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(Duration::from_secs(1))
            .open()?;
        Ok(Box::new(SerialChannel::new(self.path.clone(), port)?))
    }
}

pub struct SerialChannel {
    name: String,
    reader: BufReader<Box<dyn SerialPort>>,
    writer: Box<dyn SerialPort>,
    /// Bytes of a line whose terminator has not arrived yet.
    partial: Vec<u8>,
}

impl SerialChannel {
    pub fn new(name: String, port: Box<dyn SerialPort>) -> Result<Self> {
        let writer = port.try_clone()?;
        Ok(Self {
            name,
            reader: BufReader::new(port),
            writer,
            partial: Vec::new(),
        })
    }
}

impl SensorChannel for SerialChannel {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        trace!(port = %self.name, %command, "Sending command");
        self.writer
            .write_all(command.to_line().as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|err| io_failure(&self.name, "write", &err))
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        self.reader.get_mut().set_timeout(timeout)?;
        let line = read_frame(&mut self.reader, &mut self.partial, &self.name)?;
        trace!(port = %self.name, %line, "Received line");
        Ok(line)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.partial.clear();
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader.get_mut().clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Read one newline-terminated line into `partial`.
///
/// Bytes received before a timeout stay in `partial` and are completed by the
/// next call. Invalid UTF-8 is reported with a lossy rendering of the line.
fn read_frame<R: BufRead>(reader: &mut R, partial: &mut Vec<u8>, name: &str) -> Result<String> {
    match reader.read_until(b'\n', partial) {
        Ok(0) => Err(GrowError::DeviceLost(format!("{name} closed"))),
        Ok(_) => {
            let raw = std::mem::take(partial);
            match String::from_utf8(raw) {
                Ok(line) => Ok(line.trim().to_string()),
                Err(err) => {
                    let lossy = String::from_utf8_lossy(err.as_bytes());
                    Err(GrowError::malformed(lossy.trim(), "not valid UTF-8"))
                }
            }
        }
        Err(err) if err.kind() == ErrorKind::TimedOut => {
            Err(GrowError::DeviceTimeout(name.to_string()))
        }
        Err(err) => Err(io_failure(name, "read", &err)),
    }
}

fn io_failure(name: &str, operation: &str, err: &std::io::Error) -> GrowError {
    let message = format!("{operation} {name}: {err}");
    match err.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted => GrowError::DeviceLost(message),
        _ => GrowError::Device(message),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Read};

    use super::*;

    /// Reader that hands out chunks and errors in order, then EOF.
    struct Chunks(VecDeque<io::Result<Vec<u8>>>);

    impl Chunks {
        fn new(items: Vec<io::Result<&[u8]>>) -> BufReader<Self> {
            BufReader::new(Self(
                items
                    .into_iter()
                    .map(|item| item.map(<[u8]>::to_vec))
                    .collect(),
            ))
        }
    }

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(err)) => Err(err),
                None => Ok(0),
            }
        }
    }

    fn chunk(bytes: &'static [u8]) -> io::Result<&'static [u8]> {
        Ok(bytes)
    }

    fn timed_out() -> io::Result<&'static [u8]> {
        Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn line_split_by_timeout_is_reassembled() {
        let mut reader = Chunks::new(vec![chunk(b"25,48,18"), timed_out(), chunk(b"5\n")]);
        let mut partial = Vec::new();

        assert!(matches!(
            read_frame(&mut reader, &mut partial, "tty"),
            Err(GrowError::DeviceTimeout(_))
        ));
        assert_eq!(partial, b"25,48,18".to_vec());
        assert_eq!(read_frame(&mut reader, &mut partial, "tty").unwrap(), "25,48,185");
        assert!(partial.is_empty());
    }

    #[test]
    fn invalid_utf8_keeps_the_readable_part() {
        let mut reader = Chunks::new(vec![chunk(b"12,\xff,7\r\n")]);
        let mut partial = Vec::new();
        let err = read_frame(&mut reader, &mut partial, "tty").unwrap_err();
        let GrowError::MalformedReading { line, .. } = &err else {
            panic!("expected a malformed reading, got {err:?}");
        };
        assert!(line.starts_with("12,"));
        assert!(line.ends_with(",7"));
    }

    #[test]
    fn end_of_stream_means_device_lost() {
        let mut reader = Chunks::new(vec![]);
        let mut partial = Vec::new();
        let err = read_frame(&mut reader, &mut partial, "tty").unwrap_err();
        assert!(matches!(err, GrowError::DeviceLost(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn disconnect_errors_are_terminal() {
        let lost = io_failure("tty", "write", &io::Error::from(ErrorKind::BrokenPipe));
        assert!(matches!(lost, GrowError::DeviceLost(_)));

        let transient = io_failure("tty", "read", &io::Error::from(ErrorKind::Interrupted));
        assert!(matches!(transient, GrowError::Device(_)));
        assert!(transient.is_recoverable());
    }
}
