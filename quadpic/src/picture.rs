use std::{
    collections::TryReserveError,
    ffi::OsString,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use thiserror::Error;

use crate::{
    codec::{self, FormatError, ReferenceError},
    header::Header,
    operations::MirrorAxis,
    pixel::{GeometryError, PixelBuffer},
    quadtree::QuadNode,
};

/// A picture stored as a quadtree, ready to be encoded or rasterized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadPicture {
    header: Header,
    root: QuadNode,
}

impl QuadPicture {
    /// Compress a pixel buffer into a quadtree picture. See
    /// [`QuadNode::from_region`] for the meaning of `threshold`.
    pub fn from_pixels(buffer: &PixelBuffer, threshold: u32) -> Result<Self, Error> {
        let root = QuadNode::build(buffer, threshold)?;
        Ok(Self::from_tree(root))
    }

    /// Wrap an existing tree, computing its header.
    pub fn from_tree(root: QuadNode) -> Self {
        let header = Header {
            leaf_count: root.leaf_count(),
            node_count: root.node_count(),
        };

        Self { header, root }
    }

    /// Encode the picture into anything that implements [Write].
    ///
    /// Returns the number of bytes written.
    pub fn encode<O: Write + WriteBytesExt>(&self, mut output: O) -> Result<usize, Error> {
        let header = codec::encode(&self.root, &mut output)?;

        Ok(header.len() + header.node_count as usize * codec::FlatRecord::LEN)
    }

    /// Decode a picture from anything that implements [Read].
    ///
    /// The input must hold exactly one picture.
    pub fn decode<I: Read + ReadBytesExt>(mut input: I) -> Result<Self, Error> {
        let root = codec::decode(&mut input)?;

        let mut rest = [0u8; 1];
        if input.read(&mut rest)? != 0 {
            return Err(FormatError::TrailingData.into());
        }

        Ok(Self::from_tree(root))
    }

    /// Save the picture to a file.
    ///
    /// Data is written to a temporary file next to `path` first, which then
    /// replaces `path`. On error the target is left untouched.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        write_atomic(path.as_ref(), |out| self.encode(out).map(|_| ()))
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn root(&self) -> &QuadNode {
        &self.root
    }

    pub fn into_root(self) -> QuadNode {
        self.root
    }

    /// Side length of the picture in pixels.
    pub fn side(&self) -> Result<u32, Error> {
        self.root.side()
    }

    /// Mirror the picture across `axis`. The header is unaffected.
    pub fn mirror(&mut self, axis: MirrorAxis) {
        self.root.mirror(axis);
    }

    /// Rasterize the picture.
    pub fn to_pixels(&self) -> Result<PixelBuffer, Error> {
        self.root.to_pixels()
    }
}

/// Open a quadtree picture file.
pub fn open<P: AsRef<Path>>(path: P) -> Result<QuadPicture, Error> {
    let input = BufReader::new(File::open(path)?);

    QuadPicture::decode(input)
}

/// Compress `buffer` and write the encoded picture to `output`.
pub fn compress<O: Write + WriteBytesExt>(
    buffer: &PixelBuffer,
    threshold: u32,
    mut output: O,
) -> Result<Header, Error> {
    let root = QuadNode::build(buffer, threshold)?;
    let header = codec::encode(&root, &mut output)?;

    info!(
        "compressed {side}×{side} image into {} nodes, {} leaves",
        header.node_count,
        header.leaf_count,
        side = buffer.side(),
    );

    Ok(header)
}

/// Decode an encoded picture from `input` and rasterize it.
pub fn decompress<I: Read + ReadBytesExt>(input: I) -> Result<PixelBuffer, Error> {
    let picture = QuadPicture::decode(input)?;
    let buffer = picture.to_pixels()?;

    info!(
        "decompressed {} nodes into a {side}×{side} image",
        picture.header.node_count,
        side = buffer.side(),
    );

    Ok(buffer)
}

/// Mirror `buffer` across `axis` by way of its quadtree.
///
/// The result is only as detailed as the tree built with `threshold`.
pub fn mirror(buffer: &PixelBuffer, axis: MirrorAxis, threshold: u32) -> Result<PixelBuffer, Error> {
    let mut root = QuadNode::build(buffer, threshold)?;
    root.mirror(axis);

    debug!("mirrored {} nodes across the {axis:?} axis", root.node_count());

    root.to_pixels()
}

/// Write a file through `write`, replacing `path` only once it succeeds.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), Error>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), Error>,
{
    let temp = temp_path(path);

    let result = File::create(&temp)
        .map_err(Error::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&temp, path).map_err(Error::from));

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }

    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(format!(".{}.tmp", std::process::id()));

    path.with_file_name(name)
}

/// Any error this crate can produce.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid quadtree file: {0}")]
    Format(#[from] FormatError),

    #[error("invalid child reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("unsupported dimensions: {0}")]
    Geometry(#[from] GeometryError),

    #[error("out of memory: {0}")]
    Resource(#[from] TryReserveError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
