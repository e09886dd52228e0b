//! # Assignment Carrier Format
//!
//! The engine hands assignments to the harness through a byte stream, one entry per marked
//! variable. The format mirrors the design of the concolic trace format this crate's test
//! harness already consumes:
//!
//! * entries are postcard-encoded, so identifiers and buffers cost little beyond their own
//!   length thanks to variable-length integer encoding;
//! * the stream is prefixed by its current length as a little-endian `u64`. The writer
//!   updates this prefix whenever the stream is in a consistent state, so a reader can skip
//!   the trailing partial entry of a stream whose producer crashed mid-write.

use std::io::{self, Read, Seek, SeekFrom, Write};

use postcard::{take_from_bytes, to_allocvec};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One `identifier → bytes` binding of an assignment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssignmentEntry {
    /// Flat variable identifier, as produced by [`crate::naming::encode`]
    pub identifier: String,
    /// The concrete bytes the engine assigned to this variable
    pub bytes: Vec<u8>,
}

/// Writes a length-prefixed stream of [`AssignmentEntry`] to any [`Write`].
#[derive(Debug)]
pub struct AssignmentFileWriter<W> {
    writer: W,
    writer_start_position: u64,
}

impl<W> AssignmentFileWriter<W>
where
    W: Write + Seek,
{
    /// Creates a writer at the current stream position and reserves the length prefix.
    pub fn from_writer(mut writer: W) -> io::Result<Self> {
        let writer_start_position = writer.stream_position()?;
        // write preliminary stream length
        writer.write_all(&0_u64.to_le_bytes())?;
        Ok(Self {
            writer,
            writer_start_position,
        })
    }

    /// Appends one entry to the stream.
    pub fn write_entry(&mut self, entry: &AssignmentEntry) -> Result<(), Error> {
        let serialized = to_allocvec(entry)?;
        self.writer.write_all(&serialized)?;
        Ok(())
    }

    fn write_stream_size(&mut self) -> io::Result<()> {
        let current_pos = self.writer.stream_position()?;
        self.writer
            .seek(SeekFrom::Start(self.writer_start_position))?;
        let stream_size = current_pos - self.writer_start_position - 8;
        self.writer.write_all(&stream_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(current_pos))?;
        Ok(())
    }

    /// Updates the length prefix to cover everything written so far.
    ///
    /// Should be called whenever the stream is in a consistent state, so readers can skip
    /// entries a crashed producer only partially wrote.
    pub fn update_stream_header(&mut self) -> io::Result<()> {
        self.write_stream_size()
    }
}

/// Reads a stream of [`AssignmentEntry`] from a byte buffer.
#[derive(Debug)]
pub struct AssignmentFileReader<'buffer> {
    buffer: &'buffer [u8],
}

impl<'buffer> AssignmentFileReader<'buffer> {
    /// Creates a reader over a raw, non-length-prefixed buffer that contains exactly the
    /// stream (no partial entry).
    /// See also [`AssignmentFileReader::from_length_prefixed_buffer`].
    #[must_use]
    pub fn from_buffer(buffer: &'buffer [u8]) -> Self {
        Self { buffer }
    }

    /// Creates a reader over a buffer whose stream is prefixed by its length, as generated
    /// by [`AssignmentFileWriter`]. Anything beyond the prefixed length is ignored.
    pub fn from_length_prefixed_buffer(mut buffer: &'buffer [u8]) -> io::Result<Self> {
        let mut len_buf = 0_u64.to_le_bytes();
        buffer.read_exact(&mut len_buf)?;
        let stream_len = usize::try_from(u64::from_le_bytes(len_buf))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if stream_len > buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "length prefix exceeds the buffer",
            ));
        }
        let (buffer, _) = buffer.split_at(stream_len);
        Ok(Self::from_buffer(buffer))
    }

    /// Parses the next entry out of the stream.
    /// [`Option::None`] is returned once the stream is depleted.
    pub fn next_entry(&mut self) -> Option<Result<AssignmentEntry, Error>> {
        if self.buffer.is_empty() {
            return None;
        }
        match take_from_bytes::<AssignmentEntry>(self.buffer) {
            Ok((entry, rest)) => {
                self.buffer = rest;
                Some(Ok(entry))
            }
            Err(e) => Some(Err(Error::from(e))),
        }
    }
}
