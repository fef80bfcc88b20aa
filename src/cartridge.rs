/*!
Cartridge ROM and BIOS image containers.

Features:
- Validate and hold a raw cartridge image (up to 512 KiB; the largest
  released cartridges are 512 KiB multi-game collections)
- Validate and hold a 4 KiB BIOS image; shorter files are zero-padded to
  the full mirror size
- Reads past the end of a cartridge image return open-bus 0xFF, so bank
  selects beyond the image are harmless

The core only ever sees raw byte arrays; archive extraction and file-dialog
plumbing belong to the host. `from_file` is a convenience for raw binary
images.
*/

use std::fs;
use std::path::Path;

/// Largest supported cartridge image.
pub const MAX_ROM_SIZE: usize = 512 * 1024;

/// Exact size of the BIOS mirror.
pub const BIOS_SIZE: usize = 4096;

#[derive(Debug)]
pub struct Cartridge {
    data: Vec<u8>,
}

impl Cartridge {
    /// Take ownership of a raw cartridge image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        if data.len() > MAX_ROM_SIZE {
            return Err(format!(
                "Cartridge image is {} bytes; the largest supported image is {} bytes",
                data.len(),
                MAX_ROM_SIZE
            ));
        }
        Ok(Self {
            data: data.to_vec(),
        })
    }

    /// Load a raw binary cartridge image from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let bytes = fs::read(path).map_err(|e| format!("Failed to read cartridge file: {e}"))?;
        Self::from_bytes(&bytes)
    }

    /// Byte at `offset` into the image; out-of-image reads are open bus.
    #[inline]
    pub fn read(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0xFF)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug)]
pub struct Bios {
    data: [u8; BIOS_SIZE],
}

impl Bios {
    /// Take ownership of a BIOS image, zero-padding to the full 4 KiB.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        if data.len() > BIOS_SIZE {
            return Err(format!(
                "BIOS image is {} bytes; expected at most {} bytes",
                data.len(),
                BIOS_SIZE
            ));
        }
        let mut padded = [0u8; BIOS_SIZE];
        padded[..data.len()].copy_from_slice(data);
        Ok(Self { data: padded })
    }

    /// Load a raw binary BIOS image from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let bytes = fs::read(path).map_err(|e| format!("Failed to read BIOS file: {e}"))?;
        Self::from_bytes(&bytes)
    }

    pub fn bytes(&self) -> &[u8; BIOS_SIZE] {
        &self.data
    }
}
