//! Block image codec.
//!
//! Each logical block lives in one `block<N>.pgm` file: a binary PGM (`P5`)
//! image of 1000x1000 single-channel pixels. A payload byte maps MSB-first
//! onto eight adjacent pixels; bit 1 is white (sample 255), bit 0 black.
//! Decoding treats any sample above the midpoint as a set bit, so a lossy
//! round trip through an image editor that preserves geometry still reads
//! back correctly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::error;

use crate::config::{BLOCK_EXT, BLOCK_PX, BLOCK_SIZE_BYTES};
use crate::error::{FsError, Result};

const PGM_HEADER: &[u8] = b"P5\n1000 1000\n255\n";

/// Path of the image file backing block `id`.
pub fn block_path(fs_dir: &Path, id: u32) -> PathBuf {
    fs_dir.join(format!("block{id}.{BLOCK_EXT}"))
}

/// Create the image for block `id` with every pixel black.
pub fn create_empty_block(fs_dir: &Path, id: u32) -> Result<()> {
    let file = File::create(block_path(fs_dir, id))?;
    let mut out = BufWriter::new(file);
    out.write_all(PGM_HEADER)?;
    let row = [0u8; BLOCK_PX];
    for _ in 0..BLOCK_PX {
        out.write_all(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Write `data` at the start of block `id`, zero-padding the remainder of
/// the block. The whole image is rewritten.
pub fn write_block(fs_dir: &Path, id: u32, data: &[u8]) -> Result<()> {
    if data.len() > BLOCK_SIZE_BYTES {
        return Err(FsError::BadLen(data.len()));
    }
    let mut payload = vec![0u8; BLOCK_SIZE_BYTES];
    payload[..data.len()].copy_from_slice(data);

    let mut pixels = vec![0u8; BLOCK_SIZE_BYTES * 8];
    bits_to_pixels(&payload, &mut pixels);

    let file = File::create(block_path(fs_dir, id))?;
    let mut out = BufWriter::new(file);
    out.write_all(PGM_HEADER)?;
    out.write_all(&pixels)?;
    out.flush()?;
    Ok(())
}

/// Read the first `out.len()` bytes of block `id`.
pub fn read_block(fs_dir: &Path, id: u32, out: &mut [u8]) -> Result<()> {
    if out.len() > BLOCK_SIZE_BYTES {
        return Err(FsError::BadLen(out.len()));
    }
    let file = File::open(block_path(fs_dir, id))?;
    let mut input = BufReader::new(file);
    read_pgm_header(&mut input, id)?;

    let mut pixels = vec![0u8; out.len() * 8];
    input.read_exact(&mut pixels)?;
    pixels_to_bits(&pixels, out);
    Ok(())
}

/// Parse and validate the image header, leaving the reader at the raster.
fn read_pgm_header(input: &mut impl Read, id: u32) -> Result<()> {
    let mut magic = [0u8; 2];
    input.read_exact(&mut magic)?;
    if &magic != b"P5" {
        error!("block {id}: not a binary pgm image");
        return Err(FsError::Invalid("not a P5 image"));
    }
    let width = read_pgm_int(input)?;
    let height = read_pgm_int(input)?;
    let maxval = read_pgm_int(input)?;
    if width as usize != BLOCK_PX || height as usize != BLOCK_PX {
        error!("block {id}: image is {width}x{height}, expected {BLOCK_PX}x{BLOCK_PX}");
        return Err(FsError::BadDimensions { width, height });
    }
    if maxval != 255 {
        return Err(FsError::Invalid("unsupported pgm sample depth"));
    }
    Ok(())
}

/// One whitespace-delimited unsigned decimal from a PGM header. Consumes the
/// single whitespace byte that terminates the token.
fn read_pgm_int(input: &mut impl Read) -> Result<u32> {
    let mut byte = [0u8; 1];
    loop {
        input.read_exact(&mut byte)?;
        if !byte[0].is_ascii_whitespace() {
            break;
        }
    }
    let mut value: u32 = 0;
    loop {
        match byte[0] {
            b'0'..=b'9' => {
                value = value.wrapping_mul(10).wrapping_add(u32::from(byte[0] - b'0'));
            }
            b if b.is_ascii_whitespace() => return Ok(value),
            _ => return Err(FsError::Invalid("malformed pgm header")),
        }
        input.read_exact(&mut byte)?;
    }
}

fn bits_to_pixels(data: &[u8], pixels: &mut [u8]) {
    for (i, &byte) in data.iter().enumerate() {
        for bit in 0..8 {
            pixels[i * 8 + bit] = if byte >> (7 - bit) & 1 == 1 { 255 } else { 0 };
        }
    }
}

fn pixels_to_bits(pixels: &[u8], out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        let mut value = 0u8;
        for bit in 0..8 {
            if pixels[i * 8 + bit] > 127 {
                value |= 1 << (7 - bit);
            }
        }
        *byte = value;
    }
}
