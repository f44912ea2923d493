use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use super::error::FileStreamError;
use super::packet::{is_heartbeat, Heartbeat};

/// Outcome of a single packet read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A full data packet was written to the buffer
    Packet,
    /// Not enough bytes are available yet; try again later
    WouldBlock,
    /// The packet was a heartbeat marker
    Heartbeat(Heartbeat),
}

/// Anything that yields fixed size packets
pub trait PacketSource {
    /// Fill `buffer` with the next packet. The buffer length is the packet size.
    fn read_packet(&mut self, buffer: &mut [u8]) -> Result<ReadStatus, FileStreamError>;

    /// Bytes consumed from the source so far
    fn bytes_read(&self) -> u64;
}

/// FileStream reads packets from a run file that may still be growing.
///
/// Lines starting with `#` at the head of the file are a text preamble and are skipped.
/// A read that would run past the current end of the file consumes nothing and reports
/// WouldBlock, so a writer appending to the file can be followed.
#[derive(Debug)]
pub struct FileStream {
    reader: BufReader<File>,
    path: PathBuf,
    current_head: u64,
    preamble_size: u64,
}

impl FileStream {
    pub fn new(path: &Path) -> Result<Self, FileStreamError> {
        if !path.exists() {
            return Err(FileStreamError::BadFilePath(path.to_path_buf()));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let mut preamble_size = 0u64;
        let mut comment = Vec::new();
        while reader.fill_buf()?.first() == Some(&b'#') {
            comment.clear();
            preamble_size += reader.read_until(b'\n', &mut comment)? as u64;
            log::debug!("Skipping preamble: {}", String::from_utf8_lossy(&comment).trim_end());
        }

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            current_head: preamble_size,
            preamble_size,
        })
    }

    /// Current size of the file on disk
    pub fn size_bytes(&self) -> Result<u64, FileStreamError> {
        Ok(self.reader.get_ref().metadata()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preamble_size(&self) -> u64 {
        self.preamble_size
    }
}

impl PacketSource for FileStream {
    fn read_packet(&mut self, buffer: &mut [u8]) -> Result<ReadStatus, FileStreamError> {
        let available = self.size_bytes()?.saturating_sub(self.current_head);
        if available < buffer.len() as u64 {
            return Ok(ReadStatus::WouldBlock);
        }

        self.reader.read_exact(buffer)?;
        self.current_head += buffer.len() as u64;

        if is_heartbeat(buffer) {
            if let Ok(heartbeat) = Heartbeat::decode(buffer) {
                return Ok(ReadStatus::Heartbeat(heartbeat));
            }
        }
        Ok(ReadStatus::Packet)
    }

    fn bytes_read(&self) -> u64 {
        self.current_head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("h2g_monitor_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_missing_file() {
        let result = FileStream::new(Path::new("/definitely/not/here/Run000.h2g"));
        assert!(matches!(result, Err(FileStreamError::BadFilePath(_))));
    }

    #[test]
    fn test_preamble_and_growth() {
        let path = temp_file("growth.h2g");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"# run 12\n# board 0\n").unwrap();
        file.write_all(&[1u8; 16]).unwrap();
        file.flush().unwrap();

        let mut stream = FileStream::new(&path).unwrap();
        assert_eq!(stream.preamble_size(), 19);
        let mut buffer = [0u8; 16];
        assert_eq!(stream.read_packet(&mut buffer).unwrap(), ReadStatus::Packet);
        assert_eq!(buffer, [1u8; 16]);
        assert_eq!(stream.read_packet(&mut buffer).unwrap(), ReadStatus::WouldBlock);

        // Half a packet is not enough
        file.write_all(&[2u8; 8]).unwrap();
        file.flush().unwrap();
        assert_eq!(stream.read_packet(&mut buffer).unwrap(), ReadStatus::WouldBlock);

        file.write_all(&[3u8; 8]).unwrap();
        file.flush().unwrap();
        assert_eq!(stream.read_packet(&mut buffer).unwrap(), ReadStatus::Packet);
        assert_eq!(&buffer[..8], &[2u8; 8]);
        assert_eq!(&buffer[8..], &[3u8; 8]);
        assert_eq!(stream.bytes_read(), 19 + 32);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_heartbeat_detected() {
        let path = temp_file("heartbeat.h2g");
        let heartbeat = Heartbeat {
            seconds: 1_700_000_000,
            milliseconds: 250,
        };
        std::fs::write(&path, heartbeat.to_bytes(32)).unwrap();

        let mut stream = FileStream::new(&path).unwrap();
        let mut buffer = [0u8; 32];
        assert_eq!(
            stream.read_packet(&mut buffer).unwrap(),
            ReadStatus::Heartbeat(heartbeat)
        );
        std::fs::remove_file(&path).unwrap();
    }
}
