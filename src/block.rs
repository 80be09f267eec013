//! On-disk `.DAT` block layout: a 2048-byte, CRC-protected record holding
//! one 32x28 height grid. See spec.md §3 and §4.2, grounded in
//! `AP_SRTM_Grid.h`/`TerrainQuerySRTM.cc` from the original source.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_16_XMODEM};
use std::io::{self, Cursor, Read, Write};

/// MAVLink sends 4x4 height grids; a block on disk packs many of these,
/// overlapping by one so any coordinate resolves within a single block.
pub const MAVLINK_GRID_SIZE: usize = 4;
pub const BLOCK_MUL_X: usize = 7;
pub const BLOCK_MUL_Y: usize = 8;

/// Spacing between 32x28 grid blocks, in grid-spacing units.
pub const BLOCK_SPACING_X: usize = (BLOCK_MUL_X - 1) * MAVLINK_GRID_SIZE;
pub const BLOCK_SPACING_Y: usize = (BLOCK_MUL_Y - 1) * MAVLINK_GRID_SIZE;

/// Total grid size of one on-disk block.
pub const BLOCK_SIZE_X: usize = MAVLINK_GRID_SIZE * BLOCK_MUL_X;
pub const BLOCK_SIZE_Y: usize = MAVLINK_GRID_SIZE * BLOCK_MUL_Y;

/// Size of a `BlockIO` record on disk.
pub const BLOCK_IO_SIZE: usize = 2048;

/// Trailing padding `BlockIO` adds to align `Block` to [`BLOCK_IO_SIZE`]
/// (`BlockIO = Block + uint8_t _padding[227]` in `AP_SRTM_Grid.h`).
pub const BLOCK_PADDING_SIZE: usize = 227;

/// `sizeof(AP_SRTM_Grid::Block)` - the struct alone, without `BlockIO`'s
/// padding. The CRC covers exactly this many leading bytes, not the
/// whole padded record (`TerrainQuerySRTM::_getBlockCrc`).
pub const BLOCK_STRUCT_SIZE: usize = BLOCK_IO_SIZE - BLOCK_PADDING_SIZE;

const CRC16_CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// One decoded on-disk block: a 32x28 height grid anchored at a
/// south-west corner, plus the bookkeeping fields used to validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub bitmap: u64,
    pub sw_lat: i32,
    pub sw_lon: i32,
    pub crc16: u16,
    pub version: u16,
    pub spacing: u16,
    pub height: [[i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X], // x fastest (north-south)
    pub grid_idx_x: u16,
    pub grid_idx_y: u16,
    pub lon_degrees: i16,
    pub lat_degrees: i8,
}

impl Block {
    fn bit_index(x: usize, y: usize) -> u32 {
        ((y / MAVLINK_GRID_SIZE) + BLOCK_MUL_Y * (x / MAVLINK_GRID_SIZE)) as u32
    }

    /// Returns true if the 4x4 sub-grid covering grid position `(x, y)`
    /// has been populated, per the 56-bit coverage bitmap.
    pub fn has_subgrid(&self, x: usize, y: usize) -> bool {
        let mask = 1u64 << Self::bit_index(x, y);
        self.bitmap & mask != 0
    }

    /// Decode a raw 2048-byte `BlockIO` record.
    pub fn decode(bytes: &[u8]) -> io::Result<Block> {
        if bytes.len() != BLOCK_IO_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short block read"));
        }

        let mut cursor = Cursor::new(bytes);
        let bitmap = cursor.read_u64::<LittleEndian>()?;
        let sw_lat = cursor.read_i32::<LittleEndian>()?;
        let sw_lon = cursor.read_i32::<LittleEndian>()?;
        let crc16 = cursor.read_u16::<LittleEndian>()?;
        let version = cursor.read_u16::<LittleEndian>()?;
        let spacing = cursor.read_u16::<LittleEndian>()?;

        let mut height = [[0i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X];
        for row in height.iter_mut() {
            for sample in row.iter_mut() {
                *sample = cursor.read_i16::<LittleEndian>()?;
            }
        }

        let grid_idx_x = cursor.read_u16::<LittleEndian>()?;
        let grid_idx_y = cursor.read_u16::<LittleEndian>()?;
        let lon_degrees = cursor.read_i16::<LittleEndian>()?;
        let lat_degrees = cursor.read_i8()?;

        Ok(Block {
            bitmap,
            sw_lat,
            sw_lon,
            crc16,
            version,
            spacing,
            height,
            grid_idx_x,
            grid_idx_y,
            lon_degrees,
            lat_degrees,
        })
    }

    /// Encode this block as a 2048-byte `BlockIO` record, padded with
    /// zeroes. The CRC field is written as-is (callers computing a fresh
    /// CRC should set `crc16` first via [`Block::with_crc`]).
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(BLOCK_IO_SIZE);
        {
            let mut cursor = Cursor::new(&mut buf);
            cursor.write_u64::<LittleEndian>(self.bitmap)?;
            cursor.write_i32::<LittleEndian>(self.sw_lat)?;
            cursor.write_i32::<LittleEndian>(self.sw_lon)?;
            cursor.write_u16::<LittleEndian>(self.crc16)?;
            cursor.write_u16::<LittleEndian>(self.version)?;
            cursor.write_u16::<LittleEndian>(self.spacing)?;
            for row in &self.height {
                for &sample in row {
                    cursor.write_i16::<LittleEndian>(sample)?;
                }
            }
            cursor.write_u16::<LittleEndian>(self.grid_idx_x)?;
            cursor.write_u16::<LittleEndian>(self.grid_idx_y)?;
            cursor.write_i16::<LittleEndian>(self.lon_degrees)?;
            cursor.write_i8(self.lat_degrees)?;
        }
        buf.resize(BLOCK_IO_SIZE, 0);
        Ok(buf)
    }

    /// CRC16-CCITT (poly 0x1021, init 0x0000, no reflection, no xorout)
    /// over the first [`BLOCK_STRUCT_SIZE`] bytes of the encoded block
    /// (the `Block` struct itself) with the `crc16` field zeroed -
    /// `BlockIO`'s trailing padding is never part of the checksum, per
    /// `TerrainQuerySRTM::_getBlockCrc`'s `sizeof(block)` scope.
    pub fn compute_crc(&self) -> io::Result<u16> {
        let mut zeroed = self.clone();
        zeroed.crc16 = 0;
        let bytes = zeroed.encode()?;
        Ok(CRC16_CCITT.checksum(&bytes[..BLOCK_STRUCT_SIZE]))
    }

    /// Set `crc16` to the freshly computed checksum.
    pub fn with_crc(mut self) -> io::Result<Block> {
        self.crc16 = self.compute_crc()?;
        Ok(self)
    }

    pub fn crc_is_valid(&self) -> io::Result<bool> {
        Ok(self.compute_crc()? == self.crc16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            bitmap: 0x00FF_FFFF_FFFF_FFFF,
            sw_lat: -35 * 10_000_000,
            sw_lon: 149 * 10_000_000,
            crc16: 0,
            version: 1,
            spacing: 100,
            height: [[123i16; BLOCK_SIZE_Y]; BLOCK_SIZE_X],
            grid_idx_x: 3,
            grid_idx_y: 5,
            lon_degrees: 149,
            lat_degrees: -35,
        }
        .with_crc()
        .unwrap()
    }

    #[test]
    fn encode_decode_round_trips() {
        let block = sample_block();
        let bytes = block.encode().unwrap();
        assert_eq!(bytes.len(), BLOCK_IO_SIZE);
        let decoded = Block::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn crc_validates_untouched_block() {
        let block = sample_block();
        assert!(block.crc_is_valid().unwrap());
    }

    #[test]
    fn crc_detects_single_byte_mutation() {
        let block = sample_block();
        let mut bytes = block.encode().unwrap();
        bytes[1000] ^= 0x01;
        let mutated = Block::decode(&bytes).unwrap();
        assert!(!mutated.crc_is_valid().unwrap());
    }

    #[test]
    fn crc_ignores_padding_bytes() {
        // Bytes past BLOCK_STRUCT_SIZE are BlockIO's trailing padding, not
        // part of the struct the original CRCs - mutating one must not
        // trip the check.
        let block = sample_block();
        let mut bytes = block.encode().unwrap();
        bytes[BLOCK_STRUCT_SIZE] ^= 0xFF;
        let mutated = Block::decode(&bytes).unwrap();
        assert!(mutated.crc_is_valid().unwrap());
    }

    #[test]
    fn block_io_size_is_2048() {
        assert_eq!(BLOCK_IO_SIZE, 2048);
        assert_eq!(BLOCK_SIZE_X, 32);
        assert_eq!(BLOCK_SIZE_Y, 28);
    }
}
