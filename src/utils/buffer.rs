use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read-only random access to a file written by the builder
pub trait Buffer: Send + Sync {
    fn len(&self) -> usize;

    /// Returns the bytes in `[start, end)`
    fn slice(&self, start: usize, end: usize) -> io::Result<&[u8]>;
}

fn check_range(start: usize, end: usize, len: usize) -> io::Result<()> {
    if start > end || end > len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {}..{} is outside of the buffer (length {})", start, end, len),
        ));
    }
    Ok(())
}

/// Stores the data in memory
pub struct MemoryBuffer {
    data: Vec<u8>,
}

impl MemoryBuffer {
    pub fn new(path: &Path) -> io::Result<Self> {
        let mut file = File::options().read(true).open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(Self { data })
    }
}

impl Buffer for MemoryBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn slice(&self, start: usize, end: usize) -> io::Result<&[u8]> {
        check_range(start, end, self.data.len())?;
        Ok(&self.data[start..end])
    }
}

/// Uses a memory map
pub struct MmapBuffer {
    // Empty files cannot be mapped
    mmap: Option<Mmap>,
}

impl MmapBuffer {
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = File::options().read(true).open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None });
        }

        // The index files are never modified once built
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap: Some(mmap) })
    }

    fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }
}

impl Buffer for MmapBuffer {
    fn len(&self) -> usize {
        self.data().len()
    }

    fn slice(&self, start: usize, end: usize) -> io::Result<&[u8]> {
        let data = self.data();
        check_range(start, end, data.len())?;
        Ok(&data[start..end])
    }
}

pub fn open_buffer(path: &Path, in_memory: bool) -> io::Result<Box<dyn Buffer>> {
    Ok(if in_memory {
        Box::new(MemoryBuffer::new(path)?)
    } else {
        Box::new(MmapBuffer::new(path)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use temp_dir::TempDir;

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_slices(#[case] in_memory: bool) {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let path = dir.path().join("data.bin");
        File::create(&path)
            .and_then(|mut f| f.write_all(&[1, 2, 3, 4, 5]))
            .expect("Could not write the test file");

        let buffer = open_buffer(&path, in_memory).expect("Could not open the buffer");
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.slice(1, 3).unwrap(), &[2, 3]);
        assert_eq!(buffer.slice(5, 5).unwrap(), &[] as &[u8]);
        assert!(buffer.slice(3, 6).is_err());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_empty_file(#[case] in_memory: bool) {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let path = dir.path().join("empty.bin");
        File::create(&path).expect("Could not create the test file");

        let buffer = open_buffer(&path, in_memory).expect("Could not open the buffer");
        assert_eq!(buffer.len(), 0);
        assert!(buffer.slice(0, 0).unwrap().is_empty());
    }
}
