//! Codec for `PX1` cartridges: the binary package bundling a sprite
//! sheet, an SFX bank, and script source for a single program.
//!
//! The layout is fixed little-endian with no padding:
//!
//! ```text
//! magic "PX1"  | 3 bytes
//! version      | u16
//! flags        | u16
//! sprite count | u16
//! sfx count    | u16
//! code size    | u32
//! sprites      | per sprite: u16 width, u16 height, width×height bytes
//! sfx          | per sound: u16 speed, u16 length, 32 × (u16 freq, u8 vol, u8 wave)
//! code         | code-size bytes of script source
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use bitflags::bitflags;

/// Magic bytes opening every cartridge, with no terminator.
pub const CART_MAGIC: [u8; 3] = *b"PX1";

/// Cartridge format version this codec reads and writes.
pub const CART_VERSION: u16 = 1;

/// Notes in every SFX entry, present even past `length`.
pub const NOTE_COUNT: usize = 32;

bitflags! {
    /// Header flags word. All bits are currently reserved.
    #[derive(Default)]
    pub struct CartFlags: u16 {
        /// Reserved bit kept for carts written by pre-release tools.
        const LEGACY_AUDIO = 0x0001;
    }
}

/// Tone shape of a single note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumIter)]
#[repr(u8)]
pub enum Waveform {
    /// Pure sine tone.
    #[default]
    Sine = 0,
    /// Square wave.
    Square = 1,
    /// Triangle wave.
    Triangle = 2,
    /// Sawtooth wave.
    Sawtooth = 3,
    /// White noise.
    Noise = 4,
}

impl TryFrom<u8> for Waveform {
    type Error = CartError;

    fn try_from(byte: u8) -> Result<Self, CartError> {
        Ok(match byte {
            0 => Waveform::Sine,
            1 => Waveform::Square,
            2 => Waveform::Triangle,
            3 => Waveform::Sawtooth,
            4 => Waveform::Noise,
            _ => return Err(CartError::InvalidWaveform(byte)),
        })
    }
}

/// One note of an SFX entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Note {
    /// Frequency in Hz.
    pub frequency: u16,
    /// Volume, 0–255.
    pub volume: u8,
    /// Tone shape.
    pub waveform: Waveform,
}

/// One sprite of the sheet: indexed-color pixels, 0 is transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteData {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// `width × height` palette indices, row-major.
    pub pixels: Vec<u8>,
}

/// One entry of the SFX bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfxData {
    /// Ticks per note during playback.
    pub speed: u16,
    /// Number of notes actually used, `0..=NOTE_COUNT`.
    pub length: u16,
    /// Note storage; entries past `length` are kept but silent.
    pub notes: [Note; NOTE_COUNT],
}

impl Default for SfxData {
    fn default() -> Self {
        Self {
            speed: 1,
            length: 0,
            notes: [Note::default(); NOTE_COUNT],
        }
    }
}

/// A fully loaded cartridge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cartridge {
    /// Format version from the header.
    pub version: u16,
    /// Reserved flags word.
    pub flags: CartFlags,
    /// Sprite sheet.
    pub sprites: Vec<SpriteData>,
    /// SFX bank.
    pub sfx: Vec<SfxData>,
    /// Script source consumed by the compile pipeline.
    pub code: Vec<u8>,
}

/// Failures while reading or writing a cartridge.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// The file did not start with `PX1`.
    #[error("invalid cartridge magic {0:?}")]
    BadMagic([u8; 3]),
    /// The header names a version this codec does not read.
    #[error("unsupported cartridge version {0}")]
    UnsupportedVersion(u16),
    /// A section ended before its declared size.
    #[error("truncated cartridge while reading {0}")]
    Truncated(&'static str),
    /// A note used a waveform byte outside the table.
    #[error("invalid waveform byte {0}")]
    InvalidWaveform(u8),
    /// An SFX entry declared more notes than fit in a sound.
    #[error("sfx length {0} exceeds {NOTE_COUNT} notes")]
    SfxTooLong(u16),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Cartridge {
    /// Wrap bare script source in an otherwise empty cartridge.
    pub fn from_source(source: impl Into<Vec<u8>>) -> Self {
        Cartridge {
            version: CART_VERSION,
            code: source.into(),
            ..Cartridge::default()
        }
    }

    /// Script source as UTF-8, replacing invalid sequences.
    pub fn source(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.code)
    }

    /// Read a cartridge from any byte stream.
    pub fn decode(mut r: impl Read) -> Result<Self, CartError> {
        let mut magic = [0u8; 3];
        read_exactly(&mut r, &mut magic, "header")?;
        if magic != CART_MAGIC {
            return Err(CartError::BadMagic(magic));
        }

        let version = read_u16(&mut r, "header")?;
        if version != CART_VERSION {
            return Err(CartError::UnsupportedVersion(version));
        }
        let flags = CartFlags::from_bits_truncate(read_u16(&mut r, "header")?);
        let spr_count = read_u16(&mut r, "header")?;
        let sfx_count = read_u16(&mut r, "header")?;
        let code_size = read_u32(&mut r, "header")?;

        let mut sprites = Vec::with_capacity(spr_count as usize);
        for _ in 0..spr_count {
            let width = read_u16(&mut r, "sprite")?;
            let height = read_u16(&mut r, "sprite")?;
            let mut pixels = vec![0u8; width as usize * height as usize];
            read_exactly(&mut r, &mut pixels, "sprite")?;
            sprites.push(SpriteData {
                width,
                height,
                pixels,
            });
        }

        let mut sfx = Vec::with_capacity(sfx_count as usize);
        for _ in 0..sfx_count {
            let speed = read_u16(&mut r, "sfx")?;
            let length = read_u16(&mut r, "sfx")?;
            if length as usize > NOTE_COUNT {
                return Err(CartError::SfxTooLong(length));
            }
            let mut notes = [Note::default(); NOTE_COUNT];
            for note in notes.iter_mut() {
                let frequency = read_u16(&mut r, "sfx")?;
                let mut rest = [0u8; 2];
                read_exactly(&mut r, &mut rest, "sfx")?;
                *note = Note {
                    frequency,
                    volume: rest[0],
                    waveform: Waveform::try_from(rest[1])?,
                };
            }
            sfx.push(SfxData {
                speed,
                length,
                notes,
            });
        }

        let mut code = vec![0u8; code_size as usize];
        read_exactly(&mut r, &mut code, "code")?;

        tracing::debug!(
            sprites = sprites.len(),
            sfx = sfx.len(),
            code_bytes = code.len(),
            "cartridge loaded"
        );

        Ok(Cartridge {
            version,
            flags,
            sprites,
            sfx,
            code,
        })
    }

    /// Write the cartridge to any byte stream, bit-exact to the layout.
    pub fn encode(&self, mut w: impl Write) -> Result<(), CartError> {
        w.write_all(&CART_MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.flags.bits().to_le_bytes())?;
        w.write_all(&(self.sprites.len() as u16).to_le_bytes())?;
        w.write_all(&(self.sfx.len() as u16).to_le_bytes())?;
        w.write_all(&(self.code.len() as u32).to_le_bytes())?;

        for sprite in &self.sprites {
            w.write_all(&sprite.width.to_le_bytes())?;
            w.write_all(&sprite.height.to_le_bytes())?;
            w.write_all(&sprite.pixels)?;
        }

        for sound in &self.sfx {
            if sound.length as usize > NOTE_COUNT {
                return Err(CartError::SfxTooLong(sound.length));
            }
            w.write_all(&sound.speed.to_le_bytes())?;
            w.write_all(&sound.length.to_le_bytes())?;
            for note in &sound.notes {
                w.write_all(&note.frequency.to_le_bytes())?;
                w.write_all(&[note.volume, note.waveform as u8])?;
            }
        }

        w.write_all(&self.code)?;
        Ok(())
    }

    /// Load a cartridge from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CartError> {
        Self::decode(File::open(path)?)
    }

    /// Save the cartridge to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CartError> {
        self.encode(File::create(path)?)
    }
}

fn read_exactly(r: &mut impl Read, buf: &mut [u8], section: &'static str) -> Result<(), CartError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CartError::Truncated(section),
        _ => CartError::Io(e),
    })
}

fn read_u16(r: &mut impl Read, section: &'static str) -> Result<u16, CartError> {
    let mut buf = [0u8; 2];
    read_exactly(r, &mut buf, section)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read, section: &'static str) -> Result<u32, CartError> {
    let mut buf = [0u8; 4];
    read_exactly(r, &mut buf, section)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests;
