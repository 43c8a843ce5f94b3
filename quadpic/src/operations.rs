use crate::{
    codec::FormatError,
    picture::Error,
    pixel::{check_side, GeometryError, PixelBuffer, Region},
    quadtree::{QuadNode, Quadrant},
};

/// The axis a picture is mirrored across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Mirror across the horizontal axis, swapping top and bottom.
    Horizontal,

    /// Mirror across the vertical axis, swapping left and right.
    Vertical,
}

impl MirrorAxis {
    /// The two pairs of quadrants that trade places.
    fn swaps(self) -> [(Quadrant, Quadrant); 2] {
        match self {
            MirrorAxis::Horizontal => [
                (Quadrant::TopLeft, Quadrant::BottomLeft),
                (Quadrant::TopRight, Quadrant::BottomRight),
            ],
            MirrorAxis::Vertical => [
                (Quadrant::TopLeft, Quadrant::TopRight),
                (Quadrant::BottomLeft, Quadrant::BottomRight),
            ],
        }
    }
}

impl QuadNode {
    /// Mirror the tree in place by permuting children at every level.
    pub fn mirror(&mut self, axis: MirrorAxis) {
        let Some(children) = &mut self.children else {
            return;
        };

        for child in children.iter_mut() {
            child.mirror(axis);
        }

        for (a, b) in axis.swaps() {
            children.swap(a as usize, b as usize);
        }
    }

    /// Side length of the region this node covers, from its area.
    pub fn side(&self) -> Result<u32, Error> {
        let side = (self.area as f64).sqrt() as u32;
        if side as u64 * side as u64 != self.area as u64 {
            return Err(FormatError::NonSquareArea(self.area).into());
        }

        Ok(side)
    }

    /// Paint this node and its descendants into `region` of `buffer`.
    ///
    /// Each node fills its whole region, so descendants painted afterwards
    /// leave only leaf colors in the final image.
    pub fn paint(&self, buffer: &mut PixelBuffer, region: Region) -> Result<(), Error> {
        buffer.check_region(region)?;
        buffer.fill(region, self.color);

        let Some(children) = &self.children else {
            return Ok(());
        };

        if region.size < 2 || region.size % 2 != 0 {
            return Err(GeometryError::Indivisible(region.size).into());
        }

        for (child, quadrant) in children.iter().zip(Quadrant::ALL) {
            child.paint(buffer, quadrant.of(region))?;
        }

        Ok(())
    }

    /// Rasterize the tree into a new buffer sized from the root's area.
    pub fn to_pixels(&self) -> Result<PixelBuffer, Error> {
        let side = self.side()?;
        check_side(side)?;

        let mut buffer = PixelBuffer::new(side)?;
        self.paint(&mut buffer, Region::whole(side))?;

        Ok(buffer)
    }
}
