use std::{fs, io::BufReader, path::Path};

use image::{
    codecs::{gif::GifDecoder, png},
    ExtendedColorType, ImageEncoder, RgbaImage,
};

#[derive(Debug, thiserror::Error)]
pub enum ImgUtilError {
    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("quantization error: {0}")]
    QuantError(#[from] imagequant::Error),

    #[error("png optimization error: {0}")]
    OxipngError(#[from] oxipng::PngError),
}

type ImgUtilResult<T> = std::result::Result<T, ImgUtilError>;

/// Opens an animated gif for frame-by-frame decoding.
pub fn open_gif(path: &Path) -> ImgUtilResult<GifDecoder<BufReader<fs::File>>> {
    let file = fs::File::open(path)?;
    Ok(GifDecoder::new(BufReader::new(file))?)
}

pub trait ImageBufferExt {
    fn save_optimized_png(&self, path: impl AsRef<Path>, lossy: bool) -> ImgUtilResult<()>;
    fn to_quant_img(&self) -> Vec<imagequant::RGBA>;
}

impl ImageBufferExt for RgbaImage {
    fn save_optimized_png(&self, path: impl AsRef<Path>, lossy: bool) -> ImgUtilResult<()> {
        let (width, height) = self.dimensions();

        let raw = if lossy {
            quantize(self)?
        } else {
            self.as_raw().clone()
        };

        // oxipng does the heavy lifting, the encoder only has to produce valid input for it
        let mut encoded = Vec::new();
        png::PngEncoder::new_with_quality(
            &mut encoded,
            png::CompressionType::Fast,
            png::FilterType::NoFilter,
        )
        .write_image(&raw, width, height, ExtendedColorType::Rgba8)?;

        let mut options = oxipng::Options::from_preset(2);
        options.strip = oxipng::StripChunks::Safe;

        let optimized = oxipng::optimize_from_memory(&encoded, &options)?;
        fs::write(path, optimized)?;

        Ok(())
    }

    fn to_quant_img(&self) -> Vec<imagequant::RGBA> {
        self.pixels()
            .map(|pxl| imagequant::RGBA::new(pxl[0], pxl[1], pxl[2], pxl[3]))
            .collect()
    }
}

fn quantize(img: &RgbaImage) -> ImgUtilResult<Vec<u8>> {
    let (width, height) = img.dimensions();

    let quant = quantization_attributes()?;
    let mut liq_img = quant.new_image(img.to_quant_img(), width as usize, height as usize, 0.0)?;

    let mut qres = quant.quantize(&mut liq_img)?;
    qres.set_dithering_level(1.0)?;

    let (palette, indexed) = qres.remapped(&mut liq_img)?;

    // expand back to rgba, the output files stay plain rgba pngs either way
    let mut raw = Vec::with_capacity(indexed.len() * 4);
    for idx in indexed {
        let pxl = palette[usize::from(idx)];
        raw.extend_from_slice(&[pxl.r, pxl.g, pxl.b, pxl.a]);
    }

    Ok(raw)
}

fn quantization_attributes() -> ImgUtilResult<imagequant::Attributes> {
    let mut quant = imagequant::new();
    quant.set_speed(4)?;
    quant.set_quality(0, 100)?;
    Ok(quant)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use image::Rgba;

    use super::*;

    fn test_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gifstage_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn two_color_image() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn optimized_save_round_trips() {
        let dir = test_dir("optimized");
        let path = dir.join("out.png");

        two_color_image().save_optimized_png(&path, false).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (16, 16));
        assert_eq!(back.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(back.get_pixel(15, 0).0[3], 0);
    }

    #[test]
    fn lossy_save_preserves_alpha() {
        let dir = test_dir("lossy");
        let path = dir.join("out.png");

        two_color_image().save_optimized_png(&path, true).unwrap();

        // two distinct colors fit any palette, so the quantizer maps them exactly
        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (16, 16));
        assert_eq!(back.get_pixel(0, 0).0[3], 255);
        assert_eq!(back.get_pixel(15, 0).0[3], 0);
    }

    #[test]
    fn open_gif_rejects_garbage() {
        let dir = test_dir("garbage");
        let path = dir.join("fake.gif");
        fs::write(&path, b"not a gif").unwrap();

        assert!(matches!(
            open_gif(&path),
            Err(ImgUtilError::ImageError(_))
        ));
    }

    #[test]
    fn open_gif_reports_missing_file() {
        let dir = test_dir("missing");

        assert!(matches!(
            open_gif(&dir.join("nope.gif")),
            Err(ImgUtilError::IOError(_))
        ));
    }
}
