//! quadpic stores square pictures as quadtrees. Regions of similar color are
//! merged into single blocks, controlled by a homogeneity threshold, and the
//! resulting tree is written out as a flat array of fixed-size records.
//!
//! Compression is lossy: only the tree survives, not the original pixels.
//! The file format itself is exact, so decoding and re-encoding a file gives
//! back the same bytes.
//!
//! Pictures must be square with a power-of-two side, up to
//! [`MAX_SIDE`](pixel::MAX_SIDE) pixels.
//!
//! # File layout
//! All integers are little-endian.
//!
//! | field        | type   |                                      |
//! |--------------|--------|--------------------------------------|
//! | `leaf_count` | `u32`  | number of leaf records               |
//! | `node_count` | `u32`  | number of records that follow        |
//! | records      | 23 B each | `r g b: u8`, `area: u32`, children `[i32; 4]` |
//!
//! Records are in breadth-first order with the root first. Children are
//! listed top-left, top-right, bottom-right, bottom-left, as indices into
//! the record array, or `-1` when the node is a leaf.
//!
//! # Example
//! ## Compressing a picture
//! ```no_run
//! use quadpic::{PixelBuffer, QuadPicture};
//!
//! let bitmap = vec![
//!     0xFF, 0x00, 0x00,   0x00, 0xFF, 0x00,
//!     0x00, 0x00, 0xFF,   0xFF, 0xFF, 0xFF,
//! ];
//!
//! // Build the tree. Nothing is written at this point.
//! let buffer = PixelBuffer::from_raw(2, 2, &bitmap).expect("Not a square image");
//! let picture = QuadPicture::from_pixels(&buffer, 0).expect("Could not build the tree");
//! assert_eq!(picture.header().node_count, 5);
//!
//! // Write it out to a file.
//! picture.save("my_image.qtp").expect("Could not save the picture");
//! ```
//!
//! ## Reading a picture back
//! ```no_run
//! use std::fs::File;
//! use quadpic::QuadPicture;
//!
//! // Load it directly with the `open` function...
//! let picture = quadpic::open("my_image.qtp").expect("Could not open file");
//!
//! // ...or from something implementing Read.
//! let input_file = File::open("my_image.qtp").expect("Could not open file");
//! let picture2 = QuadPicture::decode(&input_file).expect("Could not decode file");
//!
//! let pixels = picture.to_pixels().expect("Could not rasterize");
//! ```

pub mod codec;
pub mod header;
pub mod operations;
pub mod picture;
pub mod pixel;
pub mod quadtree;

// ----------------------- //
// INLINED USEFUL FEATURES //
// ----------------------- //
#[doc(inline)]
pub use picture::{compress, decompress, mirror, open, Error, QuadPicture};

#[doc(inline)]
pub use pixel::{Pixel, PixelBuffer, Region};

#[doc(inline)]
pub use quadtree::{QuadNode, Quadrant};

#[doc(inline)]
pub use operations::MirrorAxis;

#[doc(inline)]
pub use header::Header;
