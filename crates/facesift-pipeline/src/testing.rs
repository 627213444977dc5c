//! In-memory storage and face capability fakes shared by the pipeline tests.
//!
//! Every photo is a tiny real PNG. Its red channel is the "identity" class of
//! the single face in it; class 0 means no face. The fake capability decodes
//! nothing itself, it reads the pixel the evaluator already decoded.

use async_trait::async_trait;
use facesift_core::{
    BoundingBox, CapabilityError, DetectOptions, Descriptor, FaceCapability, FaceDetection,
    ReferenceFace,
};
use facesift_drive::{CandidateFile, DriveError, FilePage, StorageProvider};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const FOLDER_LINK: &str = "https://drive.google.com/drive/folders/FOLDER?usp=sharing";

pub(crate) fn png(class: u8) -> Vec<u8> {
    let face = if class == 0 { 0 } else { 255 };
    let img = RgbImage::from_pixel(4, 4, Rgb([class, face, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub(crate) fn reference(class: u8) -> ReferenceFace {
    ReferenceFace {
        descriptor: descriptor_for(class),
        source: format!("reference-{class}.png"),
        confidence: 0.9,
    }
}

fn descriptor_for(class: u8) -> Descriptor {
    Descriptor::new(vec![class as f32, 0.0])
}

pub(crate) struct FakeFolder {
    files: Vec<(CandidateFile, Vec<u8>)>,
    failing_downloads: HashSet<String>,
    listing_fails_at: Option<usize>,
    download_delay: Duration,
    pub(crate) downloads: AtomicUsize,
    pub(crate) listings: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl FakeFolder {
    /// One image per entry of `classes`, ids `img-0`, `img-1`, ...
    pub(crate) fn with_classes(classes: &[u8]) -> Self {
        let files = classes
            .iter()
            .enumerate()
            .map(|(i, &class)| {
                let file = CandidateFile {
                    id: format!("img-{i}"),
                    name: format!("photo-{i:03}.png"),
                    mime_type: "image/png".to_string(),
                };
                (file, png(class))
            })
            .collect();
        Self {
            files,
            failing_downloads: HashSet::new(),
            listing_fails_at: None,
            download_delay: Duration::ZERO,
            downloads: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn candidate(&self, index: usize) -> CandidateFile {
        self.files[index].0.clone()
    }

    pub(crate) fn content_of(&self, id: &str) -> Vec<u8> {
        self.files
            .iter()
            .find(|(f, _)| f.id == id)
            .map(|(_, bytes)| bytes.clone())
            .unwrap()
    }

    /// Append a non-image entry, listed but never meant to be fetched.
    pub(crate) fn push_other(&mut self, id: &str, mime_type: &str) {
        let file = CandidateFile {
            id: id.to_string(),
            name: format!("{id}.bin"),
            mime_type: mime_type.to_string(),
        };
        self.files.push((file, b"not a photo".to_vec()));
    }

    pub(crate) fn fail_download(&mut self, id: &str) {
        self.failing_downloads.insert(id.to_string());
    }

    pub(crate) fn corrupt(&mut self, id: &str) {
        if let Some((_, bytes)) = self.files.iter_mut().find(|(f, _)| f.id == id) {
            *bytes = b"definitely not an image".to_vec();
        }
    }

    /// Listing page `page` (0-based) fails with a provider error.
    pub(crate) fn fail_listing_at(&mut self, page: usize) {
        self.listing_fails_at = Some(page);
    }

    pub(crate) fn set_download_delay(&mut self, delay: Duration) {
        self.download_delay = delay;
    }
}

#[async_trait]
impl StorageProvider for FakeFolder {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> facesift_drive::Result<FilePage> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        assert_eq!(folder_id, "FOLDER");

        let offset = page_token
            .map(|t| t.trim_start_matches("offset-").parse::<usize>().unwrap())
            .unwrap_or(0);
        let page_size = page_size as usize;
        if self.listing_fails_at == Some(offset / page_size) {
            return Err(DriveError::Api {
                status: 500,
                message: "backend error".into(),
            });
        }

        let end = (offset + page_size).min(self.files.len());
        Ok(FilePage {
            files: self.files[offset..end].iter().map(|(f, _)| f.clone()).collect(),
            next_page_token: (end < self.files.len()).then(|| format!("offset-{end}")),
        })
    }

    async fn download_content(&self, file_id: &str) -> facesift_drive::Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_downloads.contains(file_id) {
            return Err(DriveError::Network("connection reset".into()));
        }
        Ok(self.content_of(file_id))
    }
}

/// Reads the face class out of the top-left pixel.
pub(crate) struct PixelFaces;

impl PixelFaces {
    fn face(image: &RgbImage) -> Option<FaceDetection> {
        let Rgb([class, face, _]) = *image.get_pixel(0, 0);
        (face > 0).then(|| FaceDetection {
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: image.width() as f32,
                height: image.height() as f32,
                confidence: 0.95,
                landmarks: None,
            },
            descriptor: descriptor_for(class),
        })
    }
}

#[async_trait]
impl FaceCapability for PixelFaces {
    async fn detect_best_face(
        &self,
        image: Arc<RgbImage>,
    ) -> Result<Option<FaceDetection>, CapabilityError> {
        Ok(Self::face(&image))
    }

    async fn detect_all_faces(
        &self,
        image: Arc<RgbImage>,
        _opts: DetectOptions,
    ) -> Result<Vec<FaceDetection>, CapabilityError> {
        Ok(Self::face(&image).into_iter().collect())
    }
}
