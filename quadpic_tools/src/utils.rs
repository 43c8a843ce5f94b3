use std::{io::Write, path::Path};

use image::{
    codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding},
    ExtendedColorType, ImageEncoder, ImageReader,
};
use quadpic::{picture::write_atomic, MirrorAxis, PixelBuffer};
use text_io::read;

pub enum Assume {
    Yes,
    No,
}

/// Parse the mirror selector. Exactly `h` mirrors left to right, anything
/// else mirrors top to bottom.
pub fn mirror_axis(s: &str) -> Result<MirrorAxis, String> {
    Ok(match s {
        "h" => MirrorAxis::Vertical,
        _ => MirrorAxis::Horizontal,
    })
}

/// Read an image file of any type supported by `image` into a square
/// RGB buffer.
pub fn read_image<P: AsRef<Path>>(path: P) -> anyhow::Result<PixelBuffer> {
    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .into_rgb8();

    let width = image.width();
    let height = image.height();

    Ok(PixelBuffer::from_raw(width, height, image.as_raw())?)
}

/// Write a buffer as a binary PPM (P6) image.
pub fn write_ppm<P: AsRef<Path>>(path: P, buffer: PixelBuffer) -> anyhow::Result<()> {
    let side = buffer.side();
    let raw = buffer.into_raw();

    write_atomic(path.as_ref(), |out| {
        PnmEncoder::new(&mut *out)
            .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
            .write_image(&raw, side, side, ExtendedColorType::Rgb8)
            .map_err(std::io::Error::other)?;
        out.flush()?;

        Ok(())
    })?;

    Ok(())
}

pub fn exists_decision<P: AsRef<Path>>(place: &str, action: &str, path: &P, assume: Option<Assume>) -> bool {
    let path = path.as_ref();

    match assume {
        Some(Assume::Yes) => return true,
        Some(Assume::No) => return false,
        None => (),
    }

    loop {
        print!("{place} file {path:?} already exists. {action}? [y/N] ");
        let _ = std::io::stdout().flush();

        let opt: String = read!("{}\n");
        let opt = opt.to_lowercase();

        if opt.is_empty() {
            return false
        }

        if opt == "y" {
            return true
        }
    }
}
