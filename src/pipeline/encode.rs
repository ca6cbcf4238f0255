//! Image decoding and single-page PDF encoding.
//!
//! Approved images are stored as PDFs: one page, sized so that the image
//! prints at the configured DPI, with the pixels embedded as a JPEG
//! (`/DCTDecode`) image XObject. Alpha is composited onto white first, since
//! PDF image streams in `DeviceRGB` carry no transparency.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;
use tracing::debug;

const IMAGE_RESOURCE: &str = "Im0";

#[derive(Debug, Error)]
pub enum PdfEncodeError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("PDF serialisation failed: {0}")]
    Pdf(String),
}

/// Decode any supported raster format (PNG, JPEG, BMP, GIF, WebP).
///
/// The format is sniffed from the bytes; the filename plays no part.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

/// Flatten to 8-bit RGB, compositing any alpha channel onto white.
pub fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let a = src[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        *dst = Rgb([blend(src[0]), blend(src[1]), blend(src[2])]);
    }
    out
}

/// Encode `image` as a one-page PDF whose page is `pixels * 72 / dpi` points.
pub fn encode_pdf(image: &DynamicImage, dpi: u32, jpeg_quality: u8) -> Result<Vec<u8>, PdfEncodeError> {
    let rgb = flatten_to_rgb(image);
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PdfEncodeError::EmptyImage);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality).encode_image(&rgb)?;

    let dpi = dpi.max(1) as f64;
    let page_w = width as f64 * 72.0 / dpi;
    let page_h = height as f64 * 72.0 / dpi;

    let mut doc = Document::with_version("1.5");

    let mut img_stream = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => Object::Name(b"DCTDecode".to_vec()),
        },
        jpeg,
    );
    // The JPEG payload is already compressed.
    img_stream.allows_compression = false;
    let img_id = doc.add_object(Object::Stream(img_stream));

    let content = format!("q {page_w:.4} 0 0 {page_h:.4} 0 0 cm /{IMAGE_RESOURCE} Do Q");
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.into_bytes())));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Page".to_vec()),
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_w as _),
            Object::Real(page_h as _),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_RESOURCE => Object::Reference(img_id),
            },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PdfEncodeError::Pdf(e.to_string()))?;

    debug!(
        "Encoded {}x{} px image → {} byte PDF ({:.1}x{:.1} pt @ {} DPI)",
        width,
        height,
        buf.len(),
        page_w,
        page_h,
        dpi
    );
    Ok(buf)
}
