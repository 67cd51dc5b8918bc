//! The core index writer: one growable random-access file, written in a
//! single forward pass.
//!
//! [`IndexWriter`] owns the output file and the section frame stack. All
//! output is append-only except for patching: resolving a forward
//! reference flushes buffered writes, seeks back to the placeholder,
//! overwrites it, and returns to the append position. The writer is
//! strictly single-threaded; producers may prepare payloads concurrently
//! but must feed this writer sequentially.
//!
//! File layout:
//! ```text
//! [magic: 4 bytes "GPK1"]
//! [format version: u32]
//! [creation timestamp: u64, ms since epoch]
//! [Section]*
//! [format version: u32]      // trailer, end-of-file sanity check
//! ```
//!
//! Each section is a kind tag byte, a length field (u32, or u64 for the
//! long-distance graph family), and a body of `length` bytes.

pub mod patch;
pub mod section;

pub use patch::{FileRef, PatchWidth};
pub use section::{Frame, SectionKind};

use crate::codec::varint::{encode_zigzag32, encode_zigzag64};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::tile::TileRect;
use patch::RefKind;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic bytes at the start of every index file.
pub const MAGIC: [u8; 4] = *b"GPK1";

/// Current format version, written in header and trailer.
pub const FORMAT_VERSION: u32 = 1;

/// Streaming writer for one index file.
///
/// # Usage
///
/// ```no_run
/// use geopack::{IndexWriter, Options, SectionKind};
///
/// # fn main() -> geopack::Result<()> {
/// let mut writer = IndexWriter::create("./region.gpk", Options::default())?;
/// writer.enter(SectionKind::Metadata)?;
/// writer.write_varint32(1)?; // one key/value pair
/// writer.write_str("owner")?;
/// writer.write_str("example")?;
/// writer.leave(SectionKind::Metadata)?;
/// writer.close()?;
/// # Ok(())
/// # }
/// ```
pub struct IndexWriter {
    file: BufWriter<File>,
    /// Logical append cursor: total bytes emitted so far.
    position: u64,
    frames: Vec<Frame>,
    /// Forward references created but not yet patched.
    outstanding_refs: usize,
    options: Options,
}

impl IndexWriter {
    /// Create the output file and write the fixed header.
    pub fn create<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;

        let file = File::create(path)?;
        let mut writer = Self {
            file: BufWriter::new(file),
            position: 0,
            frames: vec![Frame { kind: SectionKind::Root, size_ref: None, bounds: None }],
            outstanding_refs: 0,
            options,
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        writer.write_bytes(&MAGIC)?;
        writer.write_fixed32(FORMAT_VERSION)?;
        writer.write_fixed64(timestamp)?;
        Ok(writer)
    }

    /// The logical append position (bytes written so far).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The options this writer was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Kind of the innermost open section.
    pub fn current_kind(&self) -> SectionKind {
        self.frames.last().map(|f| f.kind).unwrap_or(SectionKind::Root)
    }

    /// The nearest bounds context on the stack, if any section pushed one.
    pub fn bounds(&self) -> Option<TileRect> {
        self.frames.iter().rev().find_map(|f| f.bounds)
    }

    /// Open a section: write its kind tag, reserve its length slot, and
    /// push a frame. Fails if `kind` is not a legal child of the current
    /// section.
    pub fn enter(&mut self, kind: SectionKind) -> Result<()> {
        if kind == SectionKind::Root {
            return Err(Error::protocol("the root section cannot be entered"));
        }
        let parent = self.current_kind();
        if !parent.allows_child(kind) {
            return Err(Error::protocol(format!(
                "section {:?} cannot open inside {:?}",
                kind, parent
            )));
        }

        self.write_u8(kind.tag())?;
        let width = kind.length_width();
        let size_ref = FileRef::new(self.position, width, RefKind::Length);
        self.write_zeros(width.bytes())?;
        self.outstanding_refs += 1;
        self.frames.push(Frame { kind, size_ref: Some(size_ref), bounds: None });
        Ok(())
    }

    /// Attach a bounds context to the innermost open section. The context
    /// is dropped when the section closes. At most one per section.
    pub fn set_bounds(&mut self, rect: TileRect) -> Result<()> {
        let frame = self
            .frames
            .last_mut()
            .filter(|f| f.kind != SectionKind::Root)
            .ok_or_else(|| Error::protocol("no open section to attach bounds to"))?;
        if frame.bounds.is_some() {
            return Err(Error::protocol(format!(
                "section {:?} already has a bounds context",
                frame.kind
            )));
        }
        frame.bounds = Some(rect);
        Ok(())
    }

    /// Close the innermost section, verifying it matches `kind`, and
    /// patch its length slot.
    pub fn leave(&mut self, kind: SectionKind) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(Error::protocol(format!(
                "leave({:?}) with no open section",
                kind
            )));
        }
        let top = self.frames.last().map(|f| f.kind);
        if top != Some(kind) {
            return Err(Error::protocol(format!(
                "leave({:?}) but innermost section is {:?}",
                kind,
                top.unwrap()
            )));
        }

        let frame = self.frames.pop().expect("stack checked above");
        let size_ref = frame.size_ref.expect("non-root frame has a length slot");
        let length = size_ref.resolve(self.position)?;
        self.patch_slot(&size_ref, length)?;
        self.outstanding_refs -= 1;

        if self.current_kind() == SectionKind::Root {
            log::info!("{:?} section closed: {} bytes", kind, length);
        } else {
            log::debug!("{:?} closed: {} bytes", kind, length);
        }
        Ok(())
    }

    /// Reserve a zeroed shift slot at the current position, to be patched
    /// with `target - anchor` once the target is written.
    pub fn reserve_shift(&mut self, width: PatchWidth, anchor: u64) -> Result<FileRef> {
        let r = FileRef::new(self.position, width, RefKind::Shift { anchor });
        self.write_zeros(width.bytes())?;
        self.outstanding_refs += 1;
        Ok(r)
    }

    /// Patch a shift reference with the given target position. Consumes
    /// the reference; a reference can only ever be patched once.
    pub fn patch(&mut self, r: FileRef, target: u64) -> Result<()> {
        let value = r.resolve(target)?;
        self.patch_slot(&r, value)?;
        self.outstanding_refs -= 1;
        Ok(())
    }

    /// Patch a shift reference as unresolved: the stored value stays
    /// zero, which readers treat as "no target". Used when a reference's
    /// target was skipped for data-quality reasons.
    pub fn patch_null(&mut self, r: FileRef) -> Result<()> {
        self.patch_slot(&r, 0)?;
        self.outstanding_refs -= 1;
        Ok(())
    }

    /// Seek back to the slot, overwrite it, and return to the append
    /// position. All buffered output is flushed first so the read-modify
    /// sequence observes a consistent file.
    fn patch_slot(&mut self, r: &FileRef, value: u64) -> Result<()> {
        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(r.origin()))?;
        file.write_all(&r.encode(value))?;
        file.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    /// Verify the stack is balanced and every reference was patched, then
    /// write the trailer and sync the file.
    pub fn close(mut self) -> Result<()> {
        if self.frames.len() != 1 {
            let open: Vec<_> = self.frames[1..].iter().map(|f| f.kind).collect();
            return Err(Error::protocol(format!(
                "close with open sections: {:?}",
                open
            )));
        }
        if self.outstanding_refs != 0 {
            return Err(Error::protocol(format!(
                "close with {} unpatched forward references",
                self.outstanding_refs
            )));
        }

        self.write_fixed32(FORMAT_VERSION)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        log::info!("index file closed: {} bytes", self.position);
        Ok(())
    }

    // ---- primitive emitters -------------------------------------------

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a fixed-width little-endian u32.
    pub fn write_fixed32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a fixed-width little-endian u64.
    pub fn write_fixed64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a varint u32.
    pub fn write_varint32(&mut self, mut value: u32) -> Result<()> {
        let mut buf = [0u8; 5];
        let mut n = 0;
        loop {
            if value & !0x7F == 0 {
                buf[n] = value as u8;
                n += 1;
                break;
            }
            buf[n] = (value & 0x7F) as u8 | 0x80;
            n += 1;
            value >>= 7;
        }
        self.write_bytes(&buf[..n])
    }

    /// Write a varint u64.
    pub fn write_varint64(&mut self, mut value: u64) -> Result<()> {
        let mut buf = [0u8; 10];
        let mut n = 0;
        loop {
            if value & !0x7F == 0 {
                buf[n] = value as u8;
                n += 1;
                break;
            }
            buf[n] = (value & 0x7F) as u8 | 0x80;
            n += 1;
            value >>= 7;
        }
        self.write_bytes(&buf[..n])
    }

    /// Write a zigzag varint i32.
    pub fn write_sint32(&mut self, value: i32) -> Result<()> {
        self.write_varint32(encode_zigzag32(value))
    }

    /// Write a zigzag varint i64.
    pub fn write_sint64(&mut self, value: i64) -> Result<()> {
        self.write_varint64(encode_zigzag64(value))
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_varint32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes, advancing the append cursor.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn write_zeros(&mut self, count: u64) -> Result<()> {
        const ZEROS: [u8; 8] = [0; 8];
        self.write_bytes(&ZEROS[..count as usize])
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        // Best effort flush on drop; an aborted run leaves an invalid
        // partial file that callers must discard.
        let _ = self.file.flush();
    }
}
