use anyhow::Result;
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::{Jpeg, JpegSegment};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;

use super::synth::SyntheticMetadata;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

const MARKER_APP1: u8 = 0xE1;
const MARKER_APP13: u8 = 0xED;
const MARKER_COM: u8 = 0xFE;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const IPTC_HEADER: &[u8] = b"Photoshop 3.0\0";

impl SyntheticMetadata {
    /// Serialize into the TIFF/IFD payload of an EXIF APP1 segment.
    ///
    /// IFD0 gets Make, Model and DateTime; the Exif sub-IFD gets
    /// DateTimeOriginal and DateTimeDigitized. No GPS IFD and no IFD1
    /// thumbnail are emitted.
    pub fn to_exif_block(&self) -> Result<Vec<u8>> {
        let mut metadata = Metadata::new();
        metadata.set_tag(ExifTag::Make(self.make.to_string()));
        metadata.set_tag(ExifTag::Model(self.model.to_string()));
        metadata.set_tag(ExifTag::ModifyDate(self.timestamp()));
        metadata.set_tag(ExifTag::DateTimeOriginal(self.date_time_original()));
        metadata.set_tag(ExifTag::CreateDate(self.date_time_digitized()));

        let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
        if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
            anyhow::bail!("little_exif produced an empty EXIF segment");
        }
        Ok(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())
    }
}

/// Attach `tiff_data` as the only metadata of an encoded JPEG stream.
///
/// Any existing EXIF APP1 is replaced. XMP (APP1), IPTC (APP13) and comment
/// segments are dropped so the synthetic block is the sole metadata left.
pub fn attach_exif(jpeg_bytes: Vec<u8>, tiff_data: Vec<u8>) -> Result<Vec<u8>> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let before = jpeg.segments().len();
    jpeg.segments_mut().retain(|s| !is_foreign_metadata(s));
    let dropped = before - jpeg.segments().len();
    if dropped > 0 {
        log::debug!("Dropped {dropped} metadata segment(s) from encoded JPEG");
    }

    // set_exif() removes any old EXIF APP1 before inserting the new one
    jpeg.set_exif(Some(Bytes::from(tiff_data)));

    // set_exif() inserts at position 3; EXIF belongs right after APP0 (JFIF)
    if let Some(pos) = find_exif_segment_pos(&jpeg) {
        let target = if jpeg.segments().first().is_some_and(|s| s.marker() == 0xE0) {
            1
        } else {
            0
        };
        if pos > target {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(pos);
            segments.insert(target, seg);
        }
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
}

/// XMP packets, IPTC resources and free-text comments.
fn is_foreign_metadata(segment: &JpegSegment) -> bool {
    match segment.marker() {
        MARKER_APP1 => segment.contents().starts_with(XMP_HEADER),
        MARKER_APP13 => segment.contents().starts_with(IPTC_HEADER),
        MARKER_COM => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn tiny_jpeg() -> Vec<u8> {
        let pixels = vec![128u8; 8 * 8 * 3];
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 90)
            .write_image(&pixels, 8, 8, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn sample_metadata() -> SyntheticMetadata {
        SyntheticMetadata {
            make: "SONY",
            model: "ILCE-9",
            captured_at: NaiveDate::from_ymd_opt(2022, 3, 14)
                .unwrap()
                .and_hms_opt(9, 26, 53)
                .unwrap(),
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn exif_block_is_tiff_with_synthetic_strings() {
        let block = sample_metadata().to_exif_block().unwrap();
        assert!(block.starts_with(b"II") || block.starts_with(b"MM"));
        assert!(contains(&block, b"SONY"));
        assert!(contains(&block, b"ILCE-9"));
        assert!(contains(&block, b"2022:03:14 09:26:53"));
    }

    #[test]
    fn attach_places_exif_after_app0() {
        let block = sample_metadata().to_exif_block().unwrap();
        let out = attach_exif(tiny_jpeg(), block.clone()).unwrap();

        let jpeg = Jpeg::from_bytes(Bytes::from(out)).unwrap();
        assert_eq!(jpeg.exif().map(|b| b.to_vec()), Some(block));
        assert_eq!(find_exif_segment_pos(&jpeg), Some(1));
    }

    #[test]
    fn attach_replaces_existing_exif_and_drops_xmp_iptc_comments() {
        let mut jpeg = Jpeg::from_bytes(Bytes::from(tiny_jpeg())).unwrap();
        jpeg.set_exif(Some(Bytes::from_static(b"MM\0*old-exif-payload")));

        let mut xmp = XMP_HEADER.to_vec();
        xmp.extend_from_slice(b"<x:xmpmeta>SecretCam</x:xmpmeta>");
        let mut iptc = IPTC_HEADER.to_vec();
        iptc.extend_from_slice(b"8BIM-payload");
        let segments = jpeg.segments_mut();
        segments.insert(1, JpegSegment::new_with_contents(MARKER_APP1, Bytes::from(xmp)));
        segments.insert(1, JpegSegment::new_with_contents(MARKER_APP13, Bytes::from(iptc)));
        segments.insert(1, JpegSegment::new_with_contents(MARKER_COM, Bytes::from_static(b"shot by me")));

        let dirty = jpeg.encoder().bytes().to_vec();

        let block = sample_metadata().to_exif_block().unwrap();
        let out = attach_exif(dirty, block).unwrap();

        assert!(!contains(&out, b"old-exif-payload"));
        assert!(!contains(&out, b"SecretCam"));
        assert!(!contains(&out, b"8BIM-payload"));
        assert!(!contains(&out, b"shot by me"));
        assert!(contains(&out, b"ILCE-9"));

        let exif_segments = Jpeg::from_bytes(Bytes::from(out))
            .unwrap()
            .segments()
            .iter()
            .filter(|s| s.marker() == MARKER_APP1)
            .count();
        assert_eq!(exif_segments, 1);
    }

    #[test]
    fn attach_rejects_non_jpeg() {
        let block = sample_metadata().to_exif_block().unwrap();
        assert!(attach_exif(b"GIF89a not a jpeg".to_vec(), block).is_err());
    }

    #[test]
    fn attached_output_still_decodes() {
        let block = sample_metadata().to_exif_block().unwrap();
        let out = attach_exif(tiny_jpeg(), block).unwrap();
        let img = image::load_from_memory_with_format(&out, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }
}
