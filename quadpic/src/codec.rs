//! Conversion between quadtrees, flat breadth-first record arrays, and the
//! binary file body.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use log::debug;

use crate::{
    header::Header,
    picture::Error,
    pixel::{check_side, Pixel},
    quadtree::QuadNode,
};

/// Child reference value for "no child".
pub const NO_CHILD: i32 = -1;

/// Records are read into a vector grown on demand. This caps how much is
/// reserved up front based on an untrusted node count.
const MAX_PREALLOC: usize = 1 << 16;

/// One node of a flattened quadtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRecord {
    /// Color of the node's region.
    pub color: Pixel,

    /// Area of the node's region.
    pub area: u32,

    /// Indices of the children within the record array, in
    /// [`Quadrant`](crate::quadtree::Quadrant) order. Negative values mean
    /// the child is absent.
    pub children: [i32; 4],
}

impl FlatRecord {
    /// Size of an encoded record in bytes.
    pub const LEN: usize = 23;

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c < 0)
    }

    pub fn write_into<T: WriteBytesExt + Write>(&self, output: &mut T) -> Result<usize, io::Error> {
        output.write_all(&self.color.to_bytes())?;
        output.write_u32::<LE>(self.area)?;

        for child in self.children {
            output.write_i32::<LE>(child)?;
        }

        Ok(Self::LEN)
    }

    pub fn read_from<T: Read + ReadBytesExt>(input: &mut T) -> Result<Self, io::Error> {
        let mut color = [0u8; 3];
        input.read_exact(&mut color)?;
        let area = input.read_u32::<LE>()?;

        let mut children = [NO_CHILD; 4];
        for child in &mut children {
            *child = input.read_i32::<LE>()?;
        }

        Ok(FlatRecord {
            color: color.into(),
            area,
            children,
        })
    }
}

/// A file whose layout or contents are inconsistent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("file ends inside the header")]
    TruncatedHeader,

    #[error("expected {expected} records, but the file ends after {read}")]
    Truncated { expected: u32, read: u32 },

    #[error("the tree has no nodes")]
    EmptyTree,

    #[error("unexpected data after the last record")]
    TrailingData,

    #[error("header declares {header} leaves, but the records contain {actual}")]
    LeafCountMismatch { header: u32, actual: u32 },

    #[error("node {index} has {present} children, expected 0 or 4")]
    PartialSplit { index: u32, present: u32 },

    #[error("node {index} has area {area}, which is not a quarter of its parent's {parent_area}")]
    AreaMismatch { index: u32, area: u32, parent_area: u32 },

    #[error("node {0} is not reachable from the root")]
    Unreachable(u32),

    #[error("root area {0} is not a perfect square")]
    NonSquareArea(u32),

    #[error("root side {0} is not a power of two up to the maximum side")]
    RootSide(u32),

    #[error("node {0} covers no pixels")]
    ZeroArea(u32),
}

/// A child reference that breaks the breadth-first layout.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("node {parent} refers to child {child}, but there are only {node_count} nodes")]
    OutOfRange { parent: u32, child: i32, node_count: u32 },

    #[error("node {parent} refers to child {child}, which does not come after it")]
    NotForward { parent: u32, child: i32 },

    #[error("node {0} is referenced by more than one parent")]
    Shared(u32),
}

/// Flatten a tree into breadth-first order.
///
/// The root is always record 0, and every child comes after its parent.
pub fn flatten(root: &QuadNode) -> Vec<FlatRecord> {
    // First pass: a node's position in `order` is its record index.
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        queue.extend(node.children());
        order.push(node);
    }

    // Second pass: children were enqueued four at a time, so the children
    // of the n-th internal node sit at 1 + 4n onwards.
    let mut next_child = 1;
    order
        .into_iter()
        .map(|node| {
            let children = if node.is_leaf() {
                [NO_CHILD; 4]
            } else {
                let first = next_child;
                next_child += 4;
                [first, first + 1, first + 2, first + 3]
            };

            FlatRecord {
                color: node.color,
                area: node.area,
                children,
            }
        })
        .collect()
}

/// Rebuild a tree from breadth-first records, starting at record 0.
///
/// Every record must be reachable from the root exactly once, internal
/// nodes must have all four children, and each child must cover a quarter
/// of its parent's area. The root must cover a picture of a valid side, which
/// together with the area rule keeps the tree at most 16 levels deep.
pub fn unflatten(records: &[FlatRecord]) -> Result<QuadNode, Error> {
    let Some(root) = records.first() else {
        return Err(FormatError::EmptyTree.into());
    };

    let side = (root.area as f64).sqrt() as u32;
    if side as u64 * side as u64 != root.area as u64 {
        return Err(FormatError::NonSquareArea(root.area).into());
    }
    if check_side(side).is_err() {
        return Err(FormatError::RootSide(side).into());
    }

    let node_count = records.len() as u32;
    for (index, record) in records.iter().enumerate() {
        check_record(records, index as u32, record)?;
    }

    // Children always come after their parent, so building from the back
    // means every child is finished before its parent needs it.
    let mut slots: Vec<Option<QuadNode>> = Vec::new();
    slots.try_reserve_exact(records.len())?;
    slots.resize_with(records.len(), || None);

    for index in (0..records.len()).rev() {
        let record = &records[index];

        let node = if record.is_leaf() {
            QuadNode::leaf(record.color, record.area)
        } else {
            let mut take = |child: i32| {
                slots[child as usize]
                    .take()
                    .ok_or(ReferenceError::Shared(child as u32))
            };

            let children = [
                take(record.children[0])?,
                take(record.children[1])?,
                take(record.children[2])?,
                take(record.children[3])?,
            ];

            QuadNode::split(record.color, record.area, children)
        };

        slots[index] = Some(node);
    }

    if let Some(orphan) = slots.iter().skip(1).position(Option::is_some) {
        return Err(FormatError::Unreachable(orphan as u32 + 1).into());
    }

    debug!("rebuilt tree from {node_count} records");

    slots[0].take().ok_or_else(|| FormatError::EmptyTree.into())
}

fn check_record(records: &[FlatRecord], index: u32, record: &FlatRecord) -> Result<(), Error> {
    let node_count = records.len() as u32;

    if record.area == 0 {
        return Err(FormatError::ZeroArea(index).into());
    }

    let present = record.children.iter().filter(|&&c| c >= 0).count() as u32;
    if present != 0 && present != 4 {
        return Err(FormatError::PartialSplit { index, present }.into());
    }

    for child in record.children.into_iter().filter(|&c| c >= 0) {
        if child as u32 >= node_count {
            return Err(ReferenceError::OutOfRange {
                parent: index,
                child,
                node_count,
            }
            .into());
        }
        if child as u32 <= index {
            return Err(ReferenceError::NotForward { parent: index, child }.into());
        }

        let area = records[child as usize].area;
        if area as u64 * 4 != record.area as u64 {
            return Err(FormatError::AreaMismatch {
                index: child as u32,
                area,
                parent_area: record.area,
            }
            .into());
        }
    }

    Ok(())
}

/// Write a tree as a header followed by its breadth-first records.
pub fn encode<O: Write + WriteBytesExt>(root: &QuadNode, output: &mut O) -> Result<Header, Error> {
    let records = flatten(root);
    let header = Header {
        leaf_count: records.iter().filter(|r| r.is_leaf()).count() as u32,
        node_count: records.len() as u32,
    };

    header.write_into(output)?;
    for record in &records {
        record.write_into(output)?;
    }

    debug!(
        "encoded {} nodes ({} leaves) into {} bytes",
        header.node_count,
        header.leaf_count,
        Header::LEN + records.len() * FlatRecord::LEN
    );

    Ok(header)
}

/// Read the header and records of a tree.
pub fn read_records<I: Read + ReadBytesExt>(input: &mut I) -> Result<(Header, Vec<FlatRecord>), Error> {
    let header = Header::read_from(input)?;

    let mut records = Vec::new();
    records.try_reserve((header.node_count as usize).min(MAX_PREALLOC))?;

    for read in 0..header.node_count {
        match FlatRecord::read_from(input) {
            Ok(record) => records.push(record),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(FormatError::Truncated {
                    expected: header.node_count,
                    read,
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((header, records))
}

/// Read a tree written by [`encode`], checking that it is well formed.
pub fn decode<I: Read + ReadBytesExt>(input: &mut I) -> Result<QuadNode, Error> {
    let (header, records) = read_records(input)?;

    let actual = records.iter().filter(|r| r.is_leaf()).count() as u32;
    if actual != header.leaf_count {
        return Err(FormatError::LeafCountMismatch {
            header: header.leaf_count,
            actual,
        }
        .into());
    }

    unflatten(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pixel::PixelBuffer,
        quadtree::Quadrant,
    };

    const RED: Pixel = Pixel::new(255, 0, 0);

    fn leaf(color: Pixel, area: u32) -> QuadNode {
        QuadNode::leaf(color, area)
    }

    fn record(color: Pixel, area: u32, children: [i32; 4]) -> FlatRecord {
        FlatRecord { color, area, children }
    }

    /// A 4×4 tree whose top-right quadrant is split again.
    fn two_level_tree() -> QuadNode {
        let grey = |v| Pixel::new(v, v, v);
        let top_right = QuadNode::split(
            grey(50),
            4,
            [leaf(grey(10), 1), leaf(grey(20), 1), leaf(grey(30), 1), leaf(grey(40), 1)],
        );

        QuadNode::split(
            grey(100),
            16,
            [leaf(grey(1), 4), top_right, leaf(grey(2), 4), leaf(grey(3), 4)],
        )
    }

    fn encode_to_vec(tree: &QuadNode) -> Vec<u8> {
        let mut out = Vec::new();
        encode(tree, &mut out).unwrap();
        out
    }

    #[test]
    fn flatten_is_breadth_first() {
        let records = flatten(&two_level_tree());

        assert_eq!(records.len(), 9);
        assert_eq!(records[0].children, [1, 2, 3, 4]);
        assert_eq!(records[0].area, 16);

        // Top-right of the root is record 2, whose children follow the
        // root's four.
        assert_eq!(records[2].children, [5, 6, 7, 8]);
        assert_eq!(records[2].color, Pixel::new(50, 50, 50));

        for i in [1, 3, 4, 5, 6, 7, 8] {
            assert_eq!(records[i].children, [NO_CHILD; 4], "record {i}");
        }
        assert_eq!(records[5].color, Pixel::new(10, 10, 10));
        assert_eq!(records[8].color, Pixel::new(40, 40, 40));
    }

    #[test]
    fn flatten_then_unflatten() {
        let tree = two_level_tree();
        let rebuilt = unflatten(&flatten(&tree)).unwrap();

        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn solid_red_file() {
        let bytes = encode_to_vec(&leaf(RED, 16));

        #[rustfmt::skip]
        let expected: [u8; 31] = [
            1, 0, 0, 0,         // leaves
            1, 0, 0, 0,         // nodes
            255, 0, 0,          // color
            16, 0, 0, 0,        // area
            0xFF, 0xFF, 0xFF, 0xFF,
            0xFF, 0xFF, 0xFF, 0xFF,
            0xFF, 0xFF, 0xFF, 0xFF,
            0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn header_counts() {
        let tree = two_level_tree();
        let mut out = Vec::new();
        let header = encode(&tree, &mut out).unwrap();

        assert_eq!(header, Header { leaf_count: 7, node_count: 9 });
        assert_eq!(out.len(), Header::LEN + 9 * FlatRecord::LEN);

        let (read_header, records) = read_records(&mut out.as_slice()).unwrap();
        assert_eq!(read_header, header);
        assert_eq!(
            records.iter().filter(|r| r.children == [NO_CHILD; 4]).count() as u32,
            header.leaf_count
        );
    }

    #[test]
    fn encode_decode_built_tree() {
        let pixels = (0..64u32)
            .map(|i| if i % 9 == 0 { RED } else { Pixel::new(0, (i * 3) as u8, 90) })
            .collect();
        let buffer = PixelBuffer::from_pixels(8, pixels).unwrap();
        let tree = QuadNode::build(&buffer, 40).unwrap();

        let bytes = encode_to_vec(&tree);
        let decoded = decode(&mut bytes.as_slice()).unwrap();

        assert_eq!(decoded, tree);
        assert_eq!(encode_to_vec(&decoded), bytes);
    }

    #[test]
    fn root_is_never_a_child() {
        // Index 0 may only be the root. Pointing back at it is rejected
        // rather than being mistaken for "no child".
        let records = [
            record(RED, 4, [1, 2, 3, 0]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Reference(ReferenceError::NotForward { parent: 0, child: 0 }))
        ));
    }

    #[test]
    fn any_negative_reference_is_absent() {
        let records = [record(RED, 1, [-1, -7, i32::MIN, -2])];

        assert_eq!(unflatten(&records).unwrap(), leaf(RED, 1));
    }

    #[test]
    fn rejects_out_of_range_child() {
        let records = [
            record(RED, 4, [1, 2, 3, 9]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Reference(ReferenceError::OutOfRange { parent: 0, child: 9, node_count: 4 }))
        ));
    }

    #[test]
    fn rejects_shared_child() {
        let records = [
            record(RED, 4, [1, 2, 3, 3]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 1, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Reference(ReferenceError::Shared(3)))
        ));
    }

    #[test]
    fn rejects_partial_split() {
        let records = [
            record(RED, 4, [1, NO_CHILD, NO_CHILD, NO_CHILD]),
            record(RED, 1, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Format(FormatError::PartialSplit { index: 0, present: 1 }))
        ));
    }

    #[test]
    fn rejects_wrong_child_area() {
        let records = [
            record(RED, 16, [1, 2, 3, 4]),
            record(RED, 4, [NO_CHILD; 4]),
            record(RED, 4, [NO_CHILD; 4]),
            record(RED, 2, [NO_CHILD; 4]),
            record(RED, 4, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Format(FormatError::AreaMismatch { index: 3, area: 2, parent_area: 16 }))
        ));
    }

    #[test]
    fn rejects_bad_root_area() {
        let zero = [record(RED, 0, [NO_CHILD; 4])];
        assert!(matches!(
            unflatten(&zero),
            Err(Error::Format(FormatError::RootSide(0)))
        ));

        let six = [record(RED, 36, [NO_CHILD; 4])];
        assert!(matches!(
            unflatten(&six),
            Err(Error::Format(FormatError::RootSide(6)))
        ));
    }

    #[test]
    fn rejects_zero_area_records() {
        // A zero-area child passes the quarter rule under a zero-area parent,
        // so such records must be refused even when unreachable.
        let records = [
            record(RED, 1, [NO_CHILD; 4]),
            record(RED, 0, [2, 3, 4, 5]),
            record(RED, 0, [NO_CHILD; 4]),
            record(RED, 0, [NO_CHILD; 4]),
            record(RED, 0, [NO_CHILD; 4]),
            record(RED, 0, [NO_CHILD; 4]),
        ];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Format(FormatError::ZeroArea(1)))
        ));
    }

    #[test]
    fn rejects_unreachable_record() {
        let records = [record(RED, 1, [NO_CHILD; 4]), record(RED, 1, [NO_CHILD; 4])];

        assert!(matches!(
            unflatten(&records),
            Err(Error::Format(FormatError::Unreachable(1)))
        ));
    }

    #[test]
    fn rejects_truncated_records() {
        let bytes = encode_to_vec(&two_level_tree());
        let cut = &bytes[..bytes.len() - 5];

        assert!(matches!(
            decode(&mut &cut[..]),
            Err(Error::Format(FormatError::Truncated { expected: 9, read: 8 }))
        ));
    }

    #[test]
    fn rejects_wrong_leaf_count() {
        let mut bytes = encode_to_vec(&two_level_tree());
        bytes[0] = 6;

        assert!(matches!(
            decode(&mut bytes.as_slice()),
            Err(Error::Format(FormatError::LeafCountMismatch { header: 6, actual: 7 }))
        ));
    }

    #[test]
    fn quadrant_order_survives() {
        let tree = two_level_tree();
        let decoded = decode(&mut encode_to_vec(&tree).as_slice()).unwrap();

        let top_right = decoded.child(Quadrant::TopRight).unwrap();
        assert_eq!(top_right.area, 4);
        assert_eq!(
            top_right.child(Quadrant::BottomLeft).unwrap().color,
            Pixel::new(40, 40, 40)
        );
    }
}
