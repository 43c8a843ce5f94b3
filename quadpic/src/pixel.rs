use crate::picture::Error;

/// The largest image side that can be stored. Areas are written as `u32`, so
/// `MAX_SIDE * MAX_SIDE` must still fit in one.
pub const MAX_SIDE: u32 = 1 << 15;

/// A single RGB pixel, 8 bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Pixel {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

/// A square region of a [`PixelBuffer`], anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Row of the top-left pixel.
    pub row: u32,

    /// Column of the top-left pixel.
    pub col: u32,

    /// Side length of the region in pixels.
    pub size: u32,
}

impl Region {
    /// The region covering a whole buffer of the given side.
    pub fn whole(side: u32) -> Self {
        Self { row: 0, col: 0, size: side }
    }

    /// Area of the region in pixels.
    pub fn area(&self) -> u64 {
        self.size as u64 * self.size as u64
    }
}

/// Errors caused by image or region dimensions the quadtree can't work with.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("image is {width}×{height}, but must be square")]
    NonSquare { width: u32, height: u32 },

    #[error("bitmap holds {actual} bytes, expected {expected}")]
    BitmapLength { expected: usize, actual: usize },

    #[error("side {0} is not a positive power of two")]
    NotPowerOfTwo(u32),

    #[error("side {0} is larger than the maximum of {max}", max = MAX_SIDE)]
    TooLarge(u32),

    #[error("region of side {size} at ({row}, {col}) does not fit in a {side}×{side} image")]
    OutOfBounds { row: u32, col: u32, size: u32, side: u32 },

    #[error("a region of side {0} cannot be split into quadrants")]
    Indivisible(u32),
}

/// Check that `side` can be halved all the way down to single pixels.
pub fn check_side(side: u32) -> Result<(), GeometryError> {
    if !side.is_power_of_two() {
        return Err(GeometryError::NotPowerOfTwo(side));
    }
    if side > MAX_SIDE {
        return Err(GeometryError::TooLarge(side));
    }

    Ok(())
}

/// A square, row-major grid of [`Pixel`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    side: u32,
    pixels: Vec<Pixel>,
}

impl PixelBuffer {
    /// Create a black buffer of `side`×`side` pixels.
    pub fn new(side: u32) -> Result<Self, Error> {
        let len = side as usize * side as usize;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, Pixel::default());

        Ok(Self { side, pixels })
    }

    /// Create a buffer from packed RGB8 data, as produced by most image
    /// decoders. The image must be square.
    pub fn from_raw(width: u32, height: u32, bitmap: &[u8]) -> Result<Self, Error> {
        if width != height {
            return Err(GeometryError::NonSquare { width, height }.into());
        }

        let expected = width as usize * height as usize * 3;
        if bitmap.len() != expected {
            return Err(GeometryError::BitmapLength {
                expected,
                actual: bitmap.len(),
            }
            .into());
        }

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(expected / 3)?;
        pixels.extend(
            bitmap
                .chunks_exact(3)
                .map(|p| Pixel::new(p[0], p[1], p[2])),
        );

        Ok(Self { side: width, pixels })
    }

    /// Create a buffer from a row-major list of pixels.
    pub fn from_pixels(side: u32, pixels: Vec<Pixel>) -> Result<Self, Error> {
        let expected = side as usize * side as usize;
        if pixels.len() != expected {
            return Err(GeometryError::BitmapLength {
                expected: expected * 3,
                actual: pixels.len() * 3,
            }
            .into());
        }

        Ok(Self { side, pixels })
    }

    /// Side length of the buffer in pixels.
    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn pixel(&self, row: u32, col: u32) -> Pixel {
        self.pixels[self.offset(row, col)]
    }

    pub fn set_pixel(&mut self, row: u32, col: u32, color: Pixel) {
        let offset = self.offset(row, col);
        self.pixels[offset] = color;
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Iterate over every pixel of a region, row by row.
    pub fn region_pixels(&self, region: Region) -> impl Iterator<Item = Pixel> + '_ {
        (region.row..region.row + region.size).flat_map(move |row| {
            let start = self.offset(row, region.col);
            self.pixels[start..start + region.size as usize].iter().copied()
        })
    }

    /// Paint every pixel of a region with a single color.
    pub fn fill(&mut self, region: Region, color: Pixel) {
        for row in region.row..region.row + region.size {
            let start = self.offset(row, region.col);
            self.pixels[start..start + region.size as usize].fill(color);
        }
    }

    /// Whether the region lies entirely inside the buffer.
    pub fn contains(&self, region: Region) -> bool {
        region.row as u64 + region.size as u64 <= self.side as u64
            && region.col as u64 + region.size as u64 <= self.side as u64
    }

    pub(crate) fn check_region(&self, region: Region) -> Result<(), GeometryError> {
        if !self.contains(region) {
            return Err(GeometryError::OutOfBounds {
                row: region.row,
                col: region.col,
                size: region.size,
                side: self.side,
            });
        }

        Ok(())
    }

    /// Packed RGB8 bytes, row-major.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels.into_iter().flat_map(Pixel::to_bytes).collect()
    }

    fn offset(&self, row: u32, col: u32) -> usize {
        row as usize * self.side as usize + col as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_non_square() {
        let result = PixelBuffer::from_raw(4, 2, &[0; 24]);

        assert!(matches!(
            result,
            Err(Error::Geometry(GeometryError::NonSquare { width: 4, height: 2 }))
        ));
    }

    #[test]
    fn from_raw_rejects_short_bitmap() {
        let result = PixelBuffer::from_raw(2, 2, &[0; 11]);

        assert!(matches!(
            result,
            Err(Error::Geometry(GeometryError::BitmapLength { expected: 12, actual: 11 }))
        ));
    }

    #[test]
    fn raw_layout_is_row_major() {
        #[rustfmt::skip]
        let bitmap = [
            1, 1, 1,   2, 2, 2,
            3, 3, 3,   4, 4, 4,
        ];
        let buffer = PixelBuffer::from_raw(2, 2, &bitmap).unwrap();

        assert_eq!(buffer.pixel(0, 1), Pixel::new(2, 2, 2));
        assert_eq!(buffer.pixel(1, 0), Pixel::new(3, 3, 3));
        assert_eq!(buffer.into_raw(), bitmap);
    }

    #[test]
    fn fill_only_touches_region() {
        let mut buffer = PixelBuffer::new(4).unwrap();
        let red = Pixel::new(255, 0, 0);
        buffer.fill(Region { row: 2, col: 0, size: 2 }, red);

        assert_eq!(buffer.pixel(2, 0), red);
        assert_eq!(buffer.pixel(3, 1), red);
        assert_eq!(buffer.pixel(1, 0), Pixel::default());
        assert_eq!(buffer.pixel(2, 2), Pixel::default());
        assert_eq!(buffer.pixels().iter().filter(|p| **p == red).count(), 4);
    }

    #[test]
    fn region_pixels_walks_rows() {
        let pixels = (0..16).map(|i| Pixel::new(i, 0, 0)).collect();
        let buffer = PixelBuffer::from_pixels(4, pixels).unwrap();

        let reds: Vec<u8> = buffer
            .region_pixels(Region { row: 1, col: 2, size: 2 })
            .map(|p| p.r)
            .collect();

        assert_eq!(reds, [6, 7, 10, 11]);
    }

    #[test]
    fn side_checks() {
        assert_eq!(check_side(1), Ok(()));
        assert_eq!(check_side(256), Ok(()));
        assert_eq!(check_side(0), Err(GeometryError::NotPowerOfTwo(0)));
        assert_eq!(check_side(12), Err(GeometryError::NotPowerOfTwo(12)));
        assert_eq!(check_side(1 << 16), Err(GeometryError::TooLarge(1 << 16)));
    }
}
