use std::fmt;
use std::sync::Arc;

use dicom::object::from_reader;
use dicom::pixeldata::{
    DecodedPixelData, PhotometricInterpretation, PixelDecoder, PlanarConfiguration,
};
use image::ImageFormat;

const DICOM_PREAMBLE_LEN: usize = 128;
const DICOM_MAGIC: &[u8] = b"DICM";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const TIFF_LE_MAGIC: &[u8] = b"II*\0";
const TIFF_BE_MAGIC: &[u8] = b"MM\0*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Png,
    Jpeg,
    Tiff,
    Dicom,
}

impl MediaType {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        // The DICOM preamble is free-form and may itself carry a TIFF header.
        if bytes
            .get(DICOM_PREAMBLE_LEN..DICOM_PREAMBLE_LEN + DICOM_MAGIC.len())
            .is_some_and(|magic| magic == DICOM_MAGIC)
        {
            Some(Self::Dicom)
        } else if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(TIFF_LE_MAGIC) || bytes.starts_with(TIFF_BE_MAGIC) {
            Some(Self::Tiff)
        } else {
            None
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
            Self::Dicom => "application/dicom",
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::Dicom => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("slice contains no data")]
    Empty,

    #[error("unsupported image header ({0} byte(s))")]
    UnsupportedFormat(usize),

    #[error("malformed {media_type} payload: {reason}")]
    Malformed {
        media_type: MediaType,
        reason: String,
    },
}

fn malformed(media_type: MediaType, reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        media_type,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    media_type: MediaType,
    bytes: Arc<[u8]>,
}

impl Blob {
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn shares_payload(&self, other: &Blob) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<u8>,
    ) -> Result<Self, String> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(format!("unsupported channel count {channels}"));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(format!(
                "expected {expected} samples for {width}x{height}x{channels}, got {}",
                samples.len()
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn to_rgba(&self) -> Vec<u8> {
        match self.channels {
            4 => self.samples.clone(),
            3 => rgb_interleaved_to_rgba(&self.samples),
            _ => {
                let mut rgba = Vec::with_capacity(self.samples.len() * 4);
                for &gray in &self.samples {
                    rgba.extend_from_slice(&[gray, gray, gray, 255]);
                }
                rgba
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedSlice {
    pub blob: Blob,
    pub pixels: Arc<PixelBuffer>,
}

// Implementations must return the same output for the same input; stacks cache results.
pub trait SliceDecoder: Send + Sync + 'static {
    fn to_blob(&self, raw: &Arc<[u8]>) -> Result<Blob, DecodeError>;

    fn to_pixels(&self, blob: &Blob) -> Result<PixelBuffer, DecodeError>;
}

pub fn decode_slice<D: SliceDecoder + ?Sized>(
    decoder: &D,
    raw: &Arc<[u8]>,
) -> Result<DecodedSlice, DecodeError> {
    let blob = decoder.to_blob(raw)?;
    let pixels = decoder.to_pixels(&blob)?;
    Ok(DecodedSlice {
        blob,
        pixels: Arc::new(pixels),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePipeline;

impl SliceDecoder for ImagePipeline {
    fn to_blob(&self, raw: &Arc<[u8]>) -> Result<Blob, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::Empty);
        }
        let media_type =
            MediaType::sniff(raw).ok_or(DecodeError::UnsupportedFormat(raw.len()))?;
        Ok(Blob {
            media_type,
            bytes: Arc::clone(raw),
        })
    }

    fn to_pixels(&self, blob: &Blob) -> Result<PixelBuffer, DecodeError> {
        match blob.media_type.image_format() {
            Some(format) => Self::decode_raster(blob.media_type, format, blob.bytes()),
            None => Self::decode_dicom(blob.bytes()),
        }
    }
}

impl ImagePipeline {
    fn decode_raster(
        media_type: MediaType,
        format: ImageFormat,
        bytes: &[u8],
    ) -> Result<PixelBuffer, DecodeError> {
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|err| malformed(media_type, err.to_string()))?;
        let (width, height) = (image.width(), image.height());
        let color = image.color();
        let (channels, samples) = if color.has_alpha() {
            (4, image.into_rgba8().into_raw())
        } else if color.has_color() {
            (3, image.into_rgb8().into_raw())
        } else {
            (1, image.into_luma8().into_raw())
        };
        PixelBuffer::new(width, height, channels, samples)
            .map_err(|reason| malformed(media_type, reason))
    }

    fn decode_dicom(bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
        let body = bytes
            .get(DICOM_PREAMBLE_LEN..)
            .ok_or_else(|| malformed(MediaType::Dicom, "truncated preamble"))?;
        let object = from_reader(body)
            .map_err(|err| malformed(MediaType::Dicom, format!("failed to parse: {err}")))?;
        let decoded = object.decode_pixel_data().map_err(|err| {
            malformed(
                MediaType::Dicom,
                format!("failed to decode pixel data: {err}"),
            )
        })?;

        if decoded.number_of_frames() == 0 {
            return Err(malformed(MediaType::Dicom, "object holds no frames"));
        }

        let frame = match decoded.photometric_interpretation() {
            photometric if photometric.is_monochrome() => monochrome_frame(&decoded, 0),
            PhotometricInterpretation::Rgb => rgb_frame(&decoded, 0),
            other => fallback_to_dynamic(&decoded, 0, other.as_str()),
        };
        frame.map_err(|reason| malformed(MediaType::Dicom, reason))
    }
}

fn monochrome_frame(decoded: &DecodedPixelData<'_>, frame_idx: u32) -> Result<PixelBuffer, String> {
    let width = decoded.columns();
    let height = decoded.rows();
    let invert = matches!(
        decoded.photometric_interpretation(),
        PhotometricInterpretation::Monochrome1
    );

    let mut gray = if decoded.bits_allocated() <= 8 {
        decoded
            .to_vec_frame::<u8>(frame_idx)
            .map_err(|err| format!("failed to materialize frame data: {err}"))?
    } else {
        let samples = decoded
            .to_vec_frame::<u16>(frame_idx)
            .map_err(|err| format!("failed to materialize frame data: {err}"))?;
        let (min, max) = min_max_u16(&samples).unwrap_or((0, 0));
        samples
            .iter()
            .map(|&value| normalize_u16(value, min, max))
            .collect()
    };

    if invert {
        for value in &mut gray {
            *value = 255 - *value;
        }
    }
    PixelBuffer::new(width, height, 1, gray)
}

fn rgb_frame(decoded: &DecodedPixelData<'_>, frame_idx: u32) -> Result<PixelBuffer, String> {
    let width = decoded.columns();
    let height = decoded.rows();
    let pixel_count = width as usize * height as usize;

    // Sample conversion in dicom-pixeldata refuses planar data, so read the
    // stored samples and interleave here.
    let rgb = if decoded.bits_allocated() <= 8 {
        let samples = decoded
            .frame_data(frame_idx)
            .map_err(|err| format!("failed to materialize RGB frame: {err}"))?;
        match decoded.planar_configuration() {
            PlanarConfiguration::Standard => samples.to_vec(),
            PlanarConfiguration::PixelFirst => rgb_planar_to_interleaved(samples, pixel_count)?,
        }
    } else {
        let samples = decoded
            .frame_data_ow(frame_idx)
            .map_err(|err| format!("failed to materialize RGB frame: {err}"))?;
        let interleaved = match decoded.planar_configuration() {
            PlanarConfiguration::Standard => samples,
            PlanarConfiguration::PixelFirst => rgb_planar_to_interleaved(&samples, pixel_count)?,
        };
        normalize_rgb_u16(&interleaved)?
    };
    PixelBuffer::new(width, height, 3, rgb)
}

fn fallback_to_dynamic(
    decoded: &DecodedPixelData<'_>,
    frame_idx: u32,
    interpretation: &str,
) -> Result<PixelBuffer, String> {
    let image = decoded
        .to_dynamic_image(frame_idx)
        .map_err(|err| format!("unsupported photometric interpretation `{interpretation}`: {err}"))?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    PixelBuffer::new(width, height, 3, rgb.into_raw())
}

fn rgb_interleaved_to_rgba(samples: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(samples.len() / 3 * 4);
    for chunk in samples.chunks_exact(3) {
        if let [r, g, b] = *chunk {
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }
    rgba
}

fn rgb_planar_to_interleaved<T: Copy>(samples: &[T], pixel_count: usize) -> Result<Vec<T>, String> {
    if samples.len() < pixel_count * 3 {
        return Err(format!(
            "RGB buffer length {} is too small for {pixel_count} pixels",
            samples.len()
        ));
    }
    let (r_plane, rest) = samples.split_at(pixel_count);
    let (g_plane, b_plane) = rest.split_at(pixel_count);

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for idx in 0..pixel_count {
        rgb.extend_from_slice(&[r_plane[idx], g_plane[idx], b_plane[idx]]);
    }
    Ok(rgb)
}

fn normalize_rgb_u16(samples: &[u16]) -> Result<Vec<u8>, String> {
    if samples.len() % 3 != 0 {
        return Err(format!(
            "RGB buffer length {} is not divisible by 3",
            samples.len()
        ));
    }

    let (mut r_min, mut r_max) = (u16::MAX, u16::MIN);
    let (mut g_min, mut g_max) = (u16::MAX, u16::MIN);
    let (mut b_min, mut b_max) = (u16::MAX, u16::MIN);

    for chunk in samples.chunks_exact(3) {
        if let [r, g, b] = *chunk {
            r_min = r_min.min(r);
            r_max = r_max.max(r);
            g_min = g_min.min(g);
            g_max = g_max.max(g);
            b_min = b_min.min(b);
            b_max = b_max.max(b);
        }
    }

    let mut rgb = Vec::with_capacity(samples.len());
    for chunk in samples.chunks_exact(3) {
        if let [r, g, b] = *chunk {
            rgb.extend_from_slice(&[
                normalize_u16(r, r_min, r_max),
                normalize_u16(g, g_min, g_max),
                normalize_u16(b, b_min, b_max),
            ]);
        }
    }
    Ok(rgb)
}

fn min_max_u16(values: &[u16]) -> Option<(u16, u16)> {
    values.iter().copied().fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}

fn normalize_u16(value: u16, min: u16, max: u16) -> u8 {
    if max <= min {
        return 0;
    }

    let range = (max - min) as f32;
    let normalized = (value.saturating_sub(min)) as f32 / range;
    (normalized * 255.0).clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;
    use std::sync::Arc;

    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::dictionary_std::{tags, uids};
    use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";

    pub fn rgb_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 40) as u8, (y * 40) as u8, ((x + y) * 10) as u8])
        }))
    }

    pub fn png_rgb(width: u32, height: u32) -> Arc<[u8]> {
        encode(rgb_image(width, height), ImageFormat::Png)
    }

    pub fn png_gray(width: u32, height: u32) -> Arc<[u8]> {
        let image = GrayImage::from_fn(width, height, |x, y| Luma([(x + y * width) as u8]));
        encode(DynamicImage::ImageLuma8(image), ImageFormat::Png)
    }

    pub fn encode(image: DynamicImage, format: ImageFormat) -> Arc<[u8]> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, format)
            .expect("encode image fixture");
        Arc::from(buffer.into_inner())
    }

    pub enum Samples {
        U8(Vec<u8>),
        U16(Vec<u16>),
    }

    pub fn dicom_frame(
        photometric: &str,
        rows: u16,
        columns: u16,
        planar: Option<u16>,
        samples: Samples,
    ) -> Arc<[u8]> {
        let samples_per_pixel: u16 = if photometric == "RGB" { 3 } else { 1 };
        let (bits, pixel_data) = match samples {
            Samples::U8(values) => (
                8_u16,
                DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::U8(values.into())),
            ),
            Samples::U16(values) => (
                16_u16,
                DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(values.into())),
            ),
        };

        let mut elements = vec![
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(SECONDARY_CAPTURE)),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("2.25.1")),
            DataElement::new(
                tags::SAMPLES_PER_PIXEL,
                VR::US,
                PrimitiveValue::from(samples_per_pixel),
            ),
            DataElement::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                VR::CS,
                PrimitiveValue::from(photometric),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(columns)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(bits)),
            DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(bits)),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(bits - 1)),
            DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
        ];
        if let Some(planar) = planar {
            elements.push(DataElement::new(
                tags::PLANAR_CONFIGURATION,
                VR::US,
                PrimitiveValue::from(planar),
            ));
        }
        elements.push(pixel_data);

        let file = InMemDicomObject::from_element_iter(elements)
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(SECONDARY_CAPTURE)
                    .media_storage_sop_instance_uid("2.25.1"),
            )
            .expect("build dicom meta");
        let mut bytes = Vec::new();
        file.write_all(&mut bytes).expect("write dicom fixture");
        Arc::from(bytes)
    }

    pub fn dicom_mono8(rows: u16, columns: u16) -> Arc<[u8]> {
        let pixel_count = rows as usize * columns as usize;
        let pixels = (0..pixel_count).map(|value| (value * 7) as u8).collect();
        dicom_frame("MONOCHROME2", rows, columns, None, Samples::U8(pixels))
    }
}
