// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Presentation package assembly: media store, slide parts, zip container.

use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Write};

use chrono::Utc;
use image::ImageFormat;
use reslide_core::error::{ReslideError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::parts;
use crate::image::ImageProcessor;

/// Images embedded in the package, stored once per distinct content.
#[derive(Debug, Default)]
pub struct MediaStore {
    by_digest: HashMap<String, String>,
    files: Vec<(String, Vec<u8>)>,
}

impl MediaStore {
    /// Add encoded image bytes; returns the media file name. PNG, JPEG and GIF
    /// are stored as-is, anything else is re-encoded to PNG.
    pub fn add(&mut self, data: Vec<u8>) -> Result<String> {
        let digest = hex::encode(Sha256::digest(&data));
        if let Some(name) = self.by_digest.get(&digest) {
            return Ok(name.clone());
        }
        let (ext, data) = match image::guess_format(&data) {
            Ok(ImageFormat::Png) => ("png", data),
            Ok(ImageFormat::Jpeg) => ("jpeg", data),
            Ok(ImageFormat::Gif) => ("gif", data),
            _ => ("png", ImageProcessor::from_bytes(&data)?.to_png_bytes()?),
        };
        let name = format!("image-{}.{ext}", &digest[..16]);
        debug!(%name, bytes = data.len(), "media added");
        self.by_digest.insert(digest, name.clone());
        self.files.push((name.clone(), data));
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn extensions(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .files
            .iter()
            .filter_map(|(name, _)| name.rsplit('.').next())
            .collect();
        set.into_iter().collect()
    }
}

/// One finished slide: its XML and the media names its `rId2..` refer to.
#[derive(Debug, Clone)]
pub struct SlidePart {
    pub xml: String,
    pub media: Vec<String>,
}

/// A presentation under construction.
#[derive(Debug)]
pub struct DeckPackage {
    width_emu: i64,
    height_emu: i64,
    font_family: String,
    title: String,
    pub media: MediaStore,
    slides: Vec<SlidePart>,
}

impl DeckPackage {
    pub fn new(width_emu: i64, height_emu: i64, font_family: impl Into<String>) -> Self {
        Self {
            width_emu,
            height_emu,
            font_family: font_family.into(),
            title: "Reconstructed slides".into(),
            media: MediaStore::default(),
            slides: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn push_slide(&mut self, slide: SlidePart) {
        self.slides.push(slide);
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Serialize every part into a zip archive.
    #[instrument(skip(self), fields(slides = self.slides.len(), media = self.media.len()))]
    pub fn finish(self) -> Result<Vec<u8>> {
        let n = self.slides.len();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let put = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, data: &[u8]| {
            write_entry(zip, name, data, options)
        };

        put(&mut zip, "[Content_Types].xml", parts::content_types(n, &self.media.extensions()).as_bytes())?;
        put(&mut zip, "_rels/.rels", parts::root_rels().as_bytes())?;
        put(&mut zip, "docProps/core.xml", parts::core_props(&self.title, Utc::now()).as_bytes())?;
        put(&mut zip, "docProps/app.xml", parts::app_props(n).as_bytes())?;
        put(
            &mut zip,
            "ppt/presentation.xml",
            parts::presentation(n, self.width_emu, self.height_emu).as_bytes(),
        )?;
        put(&mut zip, "ppt/_rels/presentation.xml.rels", parts::presentation_rels(n).as_bytes())?;
        put(&mut zip, "ppt/slideMasters/slideMaster1.xml", parts::slide_master().as_bytes())?;
        put(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            parts::slide_master_rels().as_bytes(),
        )?;
        put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", parts::slide_layout().as_bytes())?;
        put(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            parts::slide_layout_rels().as_bytes(),
        )?;
        put(&mut zip, "ppt/theme/theme1.xml", parts::theme(&self.font_family).as_bytes())?;
        put(&mut zip, "ppt/presProps.xml", parts::pres_props().as_bytes())?;
        put(&mut zip, "ppt/viewProps.xml", parts::view_props().as_bytes())?;
        put(&mut zip, "ppt/tableStyles.xml", parts::table_styles().as_bytes())?;

        for (i, slide) in self.slides.iter().enumerate() {
            let number = i + 1;
            put(&mut zip, &format!("ppt/slides/slide{number}.xml"), slide.xml.as_bytes())?;
            put(
                &mut zip,
                &format!("ppt/slides/_rels/slide{number}.xml.rels"),
                parts::slide_rels(&slide.media).as_bytes(),
            )?;
        }
        for (name, data) in &self.media.files {
            put(&mut zip, &format!("ppt/media/{name}"), data)?;
        }

        let cursor = zip
            .finish()
            .map_err(|err| ReslideError::Document(format!("failed to finalise package: {err}")))?;
        let bytes = cursor.into_inner();
        info!(bytes = bytes.len(), "presentation package written");
        Ok(bytes)
    }
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    data: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|err| ReslideError::Document(format!("zip entry {name}: {err}")))?;
    zip.write_all(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};

    use super::*;
    use crate::image::encode_png;

    fn png(colour: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([colour, 0, 0]));
        encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn identical_media_is_stored_once() {
        let mut store = MediaStore::default();
        let a = store.add(png(10)).unwrap();
        let b = store.add(png(10)).unwrap();
        let c = store.add(png(200)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
        assert!(a.starts_with("image-") && a.ends_with(".png"));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let mut store = MediaStore::default();
        assert!(store.add(b"not an image".to_vec()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn package_contains_every_part() {
        let mut deck = DeckPackage::new(18_288_000, 10_287_000, "Arial");
        let name = deck.media.add(png(1)).unwrap();
        deck.push_slide(SlidePart {
            xml: super::super::xml::slide(None, ""),
            media: vec![name.clone()],
        });
        let bytes = deck.finish().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for part in [
            "[Content_Types].xml",
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/theme/theme1.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing {part}");
        }
        assert!(archive.by_name(&format!("ppt/media/{name}")).is_ok());
    }
}
