use log::trace;

use crate::{
    picture::Error,
    pixel::{check_side, Pixel, PixelBuffer, Region},
};

/// The four quadrants of a split region.
///
/// Children are stored in this order, which goes around the square rather
/// than following raster order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

impl Quadrant {
    /// All quadrants, in child storage order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomRight,
        Quadrant::BottomLeft,
    ];

    /// The sub-region this quadrant covers within `region`.
    pub fn of(self, region: Region) -> Region {
        let half = region.size / 2;
        let (row, col) = match self {
            Quadrant::TopLeft => (region.row, region.col),
            Quadrant::TopRight => (region.row, region.col + half),
            Quadrant::BottomRight => (region.row + half, region.col + half),
            Quadrant::BottomLeft => (region.row + half, region.col),
        };

        Region { row, col, size: half }
    }
}

/// Color statistics for one region of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionStats {
    /// Mean color, truncated per channel.
    pub mean: Pixel,

    /// Mean squared deviation from `mean` over every channel sample.
    pub score: u32,
}

/// Compute the mean color and homogeneity score of a region.
pub fn region_stats(buffer: &PixelBuffer, region: Region) -> RegionStats {
    let samples = region.area();

    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for p in buffer.region_pixels(region) {
        r += p.r as u64;
        g += p.g as u64;
        b += p.b as u64;
    }

    let mean = Pixel::new(
        (r / samples) as u8,
        (g / samples) as u8,
        (b / samples) as u8,
    );

    let sq = |a: u8, b: u8| {
        let d = a as i64 - b as i64;
        (d * d) as u64
    };

    let deviation: u64 = buffer
        .region_pixels(region)
        .map(|p| sq(mean.r, p.r) + sq(mean.g, p.g) + sq(mean.b, p.b))
        .sum();

    RegionStats {
        mean,
        score: (deviation / (3 * samples)) as u32,
    }
}

/// A node of a picture quadtree.
///
/// Internal nodes always own exactly four children; a node with no children
/// is a leaf, drawn as a single block of `color`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadNode {
    /// Representative color of the region.
    pub color: Pixel,

    /// Area of the region, which is always `side * side`.
    pub area: u32,

    /// Children, indexed by [`Quadrant`].
    pub children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    /// Create a leaf node.
    pub fn leaf(color: Pixel, area: u32) -> Self {
        Self {
            color,
            area,
            children: None,
        }
    }

    /// Create an internal node from its four children, in [`Quadrant`] order.
    pub fn split(color: Pixel, area: u32, children: [QuadNode; 4]) -> Self {
        Self {
            color,
            area,
            children: Some(Box::new(children)),
        }
    }

    /// Build the quadtree for an entire buffer.
    pub fn build(buffer: &PixelBuffer, threshold: u32) -> Result<Self, Error> {
        Self::from_region(buffer, Region::whole(buffer.side()), threshold)
    }

    /// Build the quadtree for one square region of a buffer.
    ///
    /// Regions whose homogeneity score is above `threshold` are split into
    /// quadrants, the rest become leaves. A threshold of `0` splits every
    /// region that isn't a single flat color.
    pub fn from_region(buffer: &PixelBuffer, region: Region, threshold: u32) -> Result<Self, Error> {
        check_side(region.size)?;
        buffer.check_region(region)?;

        Ok(Self::build_region(buffer, region, threshold))
    }

    fn build_region(buffer: &PixelBuffer, region: Region, threshold: u32) -> Self {
        let stats = region_stats(buffer, region);
        let area = region.size * region.size;

        if stats.score > threshold {
            trace!(
                "splitting {}×{} region at ({}, {}), score {}",
                region.size, region.size, region.row, region.col, stats.score
            );

            let children = Quadrant::ALL.map(|q| Self::build_region(buffer, q.of(region), threshold));
            return Self::split(stats.mean, area, children);
        }

        Self::leaf(stats.mean, area)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// The child in the given quadrant, if this node is split.
    pub fn child(&self, quadrant: Quadrant) -> Option<&QuadNode> {
        self.children.as_ref().map(|c| &c[quadrant as usize])
    }

    /// Iterate over the children of this node, if any.
    pub fn children(&self) -> impl Iterator<Item = &QuadNode> {
        self.children.iter().flat_map(|c| c.iter())
    }

    /// Total number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> u32 {
        1 + self.children().map(QuadNode::node_count).sum::<u32>()
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> u32 {
        if self.is_leaf() {
            return 1;
        }

        self.children().map(QuadNode::leaf_count).sum()
    }

    /// Number of levels in this subtree; a lone leaf has depth 1.
    pub fn depth(&self) -> u32 {
        1 + self.children().map(QuadNode::depth).max().unwrap_or(0)
    }
}
