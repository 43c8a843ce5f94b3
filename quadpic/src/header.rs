use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{self, Read, Write};

use crate::{codec::FormatError, picture::Error};

/// A quadtree file header. This must be included at the beginning
/// of a valid file, directly followed by `node_count` records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Number of leaves in the tree, which is also the number of distinct
    /// color blocks in the picture.
    pub leaf_count: u32,

    /// Number of records (nodes) following the header.
    pub node_count: u32,
}

impl Header {
    /// Size of an encoded header in bytes.
    pub const LEN: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..4].copy_from_slice(&self.leaf_count.to_le_bytes());
        buf[4..].copy_from_slice(&self.node_count.to_le_bytes());

        buf
    }

    pub fn len(&self) -> usize {
        Self::LEN
    }

    pub fn write_into<T: WriteBytesExt + Write>(&self, output: &mut T) -> Result<usize, io::Error> {
        output.write_all(&self.to_bytes())?;

        Ok(Self::LEN)
    }

    pub fn read_from<T: Read + ReadBytesExt>(input: &mut T) -> Result<Self, Error> {
        let leaf_count = input.read_u32::<LE>().map_err(truncated)?;
        let node_count = input.read_u32::<LE>().map_err(truncated)?;

        if node_count == 0 {
            return Err(FormatError::EmptyTree.into());
        }

        Ok(Header {
            leaf_count,
            node_count,
        })
    }
}

fn truncated(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => FormatError::TruncatedHeader.into(),
        _ => err.into(),
    }
}
