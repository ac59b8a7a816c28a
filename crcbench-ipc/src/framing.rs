//! Length-Prefixed Frame Encoding
//!
//! Provides reliable message boundaries over the worker pipes, plus raw
//! payload streaming for buffers too large to live inside a frame.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Maximum frame size (16 MB) to prevent memory exhaustion
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Granularity of raw payload writes (1 MB)
pub const PAYLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors that can occur during frame encoding/decoding
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Frame bytes failed validation
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Length prefix exceeds the frame limit
    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Announced length
        size: usize,
        /// Largest accepted length
        max: usize,
    },

    /// Malformed frame header
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Peer closed the stream at a frame boundary
    #[error("End of stream")]
    EndOfStream,

    /// Peer closed the stream inside a raw payload
    #[error("Payload truncated: expected {expected} bytes, got {got}")]
    PayloadTruncated {
        /// Announced payload length
        expected: u64,
        /// Bytes received before end of stream
        got: u64,
    },
}

/// Write a message with length prefix to a writer
///
/// Frame format:
/// ```text
/// +----------------+------------------+
/// | length (4 LE)  | rkyv payload     |
/// +----------------+------------------+
/// ```
pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize<AllocSerializer<256>>,
{
    // Serialize the message
    let bytes =
        rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Serialization(e.to_string()))?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    // Write length prefix (4 bytes, little-endian)
    writer.write_all(&(len as u32).to_le_bytes())?;

    // Write payload
    writer.write_all(&bytes)?;

    // Flush to ensure message is sent
    writer.flush()?;

    Ok(())
}

/// Read a message with length prefix from a reader
pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    // Read length prefix
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;

    // Validate length
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    // Read payload into aligned buffer
    let mut buf = rkyv::AlignedVec::with_capacity(len);
    buf.resize(len, 0);
    reader.read_exact(&mut buf)?;

    // Validate and access archived data
    let archived = rkyv::check_archived_root::<T>(&buf)
        .map_err(|e| FrameError::Deserialization(e.to_string()))?;

    let value: T = archived
        .deserialize(&mut Infallible)
        .map_err(|_| FrameError::Deserialization("infallible deserializer failed".to_string()))?;

    Ok(value)
}

/// Stream raw bytes after a frame that announced their length.
///
/// The bytes are not framed: the reader must know the length up front.
pub fn write_payload<W: Write>(writer: &mut BufWriter<W>, payload: &[u8]) -> Result<(), FrameError> {
    for chunk in payload.chunks(PAYLOAD_CHUNK_SIZE) {
        writer.write_all(chunk)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read exactly `len` raw payload bytes into a freshly allocated buffer.
pub fn read_payload<R: Read>(reader: &mut BufReader<R>, len: u64) -> Result<Vec<u8>, FrameError> {
    let expected = len;
    let len = usize::try_from(len)
        .map_err(|_| FrameError::InvalidFrame(format!("payload of {} bytes", expected)))?;

    let mut payload = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let end = (filled + PAYLOAD_CHUNK_SIZE).min(len);
        match reader.read(&mut payload[filled..end]) {
            Ok(0) => {
                return Err(FrameError::PayloadTruncated {
                    expected,
                    got: filled as u64,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Io(e)),
        }
    }

    Ok(payload)
}

/// Frame writer wrapper for convenient message sending
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Create a new frame writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer), // 64KB buffer
        }
    }

    /// Write a message
    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        write_frame(&mut self.writer, message)
    }

    /// Write a message followed by its raw payload
    pub fn write_with_payload<T>(&mut self, message: &T, payload: &[u8]) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        write_frame(&mut self.writer, message)?;
        write_payload(&mut self.writer, payload)
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), FrameError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Frame reader wrapper for convenient message receiving
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Create a new frame reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader), // 64KB buffer
        }
    }

    /// Read a message
    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        read_frame(&mut self.reader)
    }

    /// Read the raw payload announced by the previous message
    pub fn read_payload(&mut self, len: u64) -> Result<Vec<u8>, FrameError> {
        read_payload(&mut self.reader, len)
    }
}
