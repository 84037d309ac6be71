use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Crc;
use std::io::Write;

use anyhow::{Result, bail};

use super::structures::*;

/// DOS date for 1980-01-01, the earliest representable timestamp
const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;
const VERSION: u16 = 20;

/// Writes a STORED (uncompressed) ZIP archive into memory.
///
/// Archive entries are already-compressed web resources for the most part, so
/// re-packaging skips DEFLATE entirely. ZIP64 output is not produced; an archive
/// that would need it is rejected.
#[derive(Default)]
pub struct ZipWriter {
    out: Vec<u8>,
    central: Vec<u8>,
    count: u64,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file entry. `name` is the slash separated path inside the archive.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.len() > u16::MAX as usize {
            bail!("Entry name is too long: {} bytes", name.len());
        }
        if data.len() as u64 >= u32::MAX as u64 || self.out.len() as u64 >= u32::MAX as u64 {
            bail!("Archive too large to re-encode without ZIP64");
        }
        if self.count >= u16::MAX as u64 {
            bail!("Too many entries to re-encode without ZIP64");
        }

        let mut crc = Crc::new();
        crc.update(data);
        let crc = crc.sum();
        let offset = self.out.len() as u32;
        let size = data.len() as u32;

        let out = &mut self.out;
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION)?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(CompressionMethod::Stored.as_u16())?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(DOS_EPOCH_DATE)?;
        out.write_u32::<LittleEndian>(crc)?;
        out.write_u32::<LittleEndian>(size)?;
        out.write_u32::<LittleEndian>(size)?;
        out.write_u16::<LittleEndian>(name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_all(name.as_bytes())?;
        out.write_all(data)?;

        let cd = &mut self.central;
        cd.write_all(CDFH_SIGNATURE)?;
        cd.write_u16::<LittleEndian>(VERSION)?;
        cd.write_u16::<LittleEndian>(VERSION)?;
        cd.write_u16::<LittleEndian>(FLAG_UTF8)?;
        cd.write_u16::<LittleEndian>(CompressionMethod::Stored.as_u16())?;
        cd.write_u16::<LittleEndian>(0)?;
        cd.write_u16::<LittleEndian>(DOS_EPOCH_DATE)?;
        cd.write_u32::<LittleEndian>(crc)?;
        cd.write_u32::<LittleEndian>(size)?;
        cd.write_u32::<LittleEndian>(size)?;
        cd.write_u16::<LittleEndian>(name.len() as u16)?;
        // extra field, comment, disk number, internal and external attributes
        cd.write_u16::<LittleEndian>(0)?;
        cd.write_u16::<LittleEndian>(0)?;
        cd.write_u16::<LittleEndian>(0)?;
        cd.write_u16::<LittleEndian>(0)?;
        cd.write_u32::<LittleEndian>(0)?;
        cd.write_u32::<LittleEndian>(offset)?;
        cd.write_all(name.as_bytes())?;

        self.count += 1;
        Ok(())
    }

    /// Append the central directory and return the encoded archive.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let cd_offset = self.out.len() as u64;
        let cd_size = self.central.len() as u64;
        if cd_offset + cd_size >= u32::MAX as u64 {
            bail!("Archive too large to re-encode without ZIP64");
        }

        self.out.extend_from_slice(&self.central);
        let eocd = EndOfCentralDirectory {
            disk_entries: self.count as u16,
            total_entries: self.count as u16,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment_len: 0,
        };
        eocd.write_to(&mut self.out)?;

        Ok(self.out)
    }
}
