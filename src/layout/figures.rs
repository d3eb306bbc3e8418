//! Figure extraction, deduplication and anchoring.
//!
//! Every figure with an id is fetched through a [`FigureSource`], fingerprinted
//! with a difference hash and compared against the figures already accepted
//! for the same document. Near-identical images share one file on disk. The
//! figure is then referenced from the paged text with a markdown image tag.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::anchor::place_image_tag;
use super::fetch::FigureSource;
use super::image_hash::{dhash_bytes, hamming_distance};
use super::model::{AnalyzeResult, ContentBuffer, Figure, Page};
use super::{LayoutSettings, Result};

/// Name of the directory, beneath the output directory, that holds images.
pub const IMAGES_DIR: &str = "images";

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup tag pattern is valid"));

/// Fingerprints of the images accepted so far in one document.
///
/// Built fresh for every extraction run and dropped with it.
#[derive(Debug, Default)]
pub struct ImageHashRegistry {
    entries: Vec<(String, PathBuf)>,
}

impl ImageHashRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved path of the first accepted image within `threshold` of `hash`.
    #[must_use]
    pub fn find_duplicate(&self, hash: &str, threshold: usize) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(saved, _)| hamming_distance(hash, saved) <= threshold)
            .map(|(_, path)| path.as_path())
    }

    pub fn insert(&mut self, hash: String, path: PathBuf) {
        self.entries.push((hash, path));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One figure that made it into the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFigure {
    pub figure_id: String,
    pub page_number: u32,
    /// File the tag points at; shared with an earlier figure when deduplicated.
    pub image_path: PathBuf,
    /// `image_path` relative to the output directory, forward slashes.
    pub relative_path: String,
    pub caption: String,
    pub tag: String,
    pub duplicate: bool,
    pub anchored: bool,
}

/// Page number encoded in a figure id such as `"3.1"`; 1 when absent.
#[must_use]
pub fn figure_page_number(figure_id: &str) -> u32 {
    figure_id
        .split('.')
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(1)
}

/// File name for a figure id, with path separators flattened.
#[must_use]
pub fn sanitize_image_name(figure_id: &str) -> String {
    format!("{figure_id}.png").replace(['/', '\\'], "_")
}

/// Strip markup, decode entities and collapse whitespace.
#[must_use]
pub fn html_to_text(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let stripped = MARKUP_TAG.replace_all(content, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caption reported by the service, followed by the figure's own text.
#[must_use]
pub fn build_caption_text(caption: &str, figure_text: &str) -> String {
    let caption = caption.trim();
    let figure_text = html_to_text(figure_text);
    if figure_text.is_empty() {
        return caption.to_string();
    }
    format!("{caption} {figure_text}").trim().to_string()
}

#[must_use]
pub fn image_tag(caption: &str, relative_path: &str) -> String {
    format!("![{caption}]({relative_path})")
}

/// Text of the figure's first span in the original content buffer.
fn figure_source_text<'a>(figure: &Figure, buffer: &ContentBuffer<'a>) -> &'a str {
    match figure.spans.first() {
        Some(span) if span.length > 0 => buffer.span_text(*span),
        _ => "",
    }
}

/// Fetches, deduplicates and saves figure images for one output directory.
pub struct FigureExtractor<'a> {
    settings: &'a LayoutSettings,
    source: &'a dyn FigureSource,
    output_dir: PathBuf,
    images_dir: PathBuf,
}

impl<'a> FigureExtractor<'a> {
    /// Prepare `<output_dir>/images`.
    pub fn new(
        settings: &'a LayoutSettings,
        source: &'a dyn FigureSource,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        let images_dir = output_dir.join(IMAGES_DIR);
        fs::create_dir_all(&images_dir)?;
        Ok(Self {
            settings,
            source,
            output_dir,
            images_dir,
        })
    }

    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Extract every figure of `result` and anchor its tag in `pages`.
    ///
    /// `buffer` must be the original, unspliced content: figure spans point
    /// into it. Failures are logged and skip only the affected figure.
    pub fn extract_all(
        &self,
        result: &AnalyzeResult,
        buffer: &ContentBuffer<'_>,
        pages: &mut [Page],
    ) -> Vec<ExtractedFigure> {
        let Some(figures) = result.figures.as_deref() else {
            debug!("result has no figures");
            return Vec::new();
        };

        let mut registry = ImageHashRegistry::new();
        let mut extracted = Vec::new();
        for figure in figures {
            let Some(figure_id) = figure.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            match self.extract_one(figure_id, figure, buffer, pages, &mut registry) {
                Ok(done) => extracted.push(done),
                Err(e) => warn!(figure_id, error = %e, "skipping figure"),
            }
        }

        info!(
            figures = extracted.len(),
            saved = registry.len(),
            "figure extraction finished"
        );
        extracted
    }

    fn extract_one(
        &self,
        figure_id: &str,
        figure: &Figure,
        buffer: &ContentBuffer<'_>,
        pages: &mut [Page],
        registry: &mut ImageHashRegistry,
    ) -> Result<ExtractedFigure> {
        let page_number = figure_page_number(figure_id);
        let bytes = self.source.fetch_figure(figure_id)?;

        let image_name = sanitize_image_name(figure_id);
        let (hash, threshold) = match dhash_bytes(&bytes, self.settings.hash_size) {
            Ok(hash) => (hash, self.settings.dedup_threshold),
            Err(e) => {
                debug!(figure_id, error = %e, "image not decodable, hashing by name");
                (image_name.clone(), 0)
            }
        };

        let (image_path, duplicate) = match registry.find_duplicate(&hash, threshold) {
            Some(existing) => {
                debug!(figure_id, path = %existing.display(), "duplicate image");
                (existing.to_path_buf(), true)
            }
            None => {
                let path = self.images_dir.join(&image_name);
                fs::write(&path, &bytes)?;
                registry.insert(hash, path.clone());
                (path, false)
            }
        };

        let source_text = figure_source_text(figure, buffer);
        let caption = figure
            .caption
            .as_ref()
            .map_or("", |c| c.content.as_str());
        let caption = build_caption_text(caption, source_text);
        let relative_path = self.relative_path(&image_path);
        let tag = image_tag(&caption, &relative_path);
        let anchored = place_image_tag(pages, page_number, source_text, &tag);

        Ok(ExtractedFigure {
            figure_id: figure_id.to_string(),
            page_number,
            image_path,
            relative_path,
            caption,
            tag,
            duplicate,
            anchored,
        })
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.output_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::{Caption, Span};
    use crate::layout::LayoutError;
    use std::collections::HashMap;

    struct MapSource(HashMap<&'static str, Vec<u8>>);

    impl FigureSource for MapSource {
        fn fetch_figure(&self, figure_id: &str) -> Result<Vec<u8>> {
            self.0
                .get(figure_id)
                .cloned()
                .ok_or_else(|| LayoutError::FigureStatus {
                    id: figure_id.to_string(),
                    status: 404,
                })
        }
    }

    fn png(shade: u8) -> Vec<u8> {
        let img = image::GrayImage::from_fn(32, 32, |x, _| {
            image::Luma([if x < 16 { shade } else { 255 - shade }])
        });
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn figure(id: &str, span: Option<Span>, caption: Option<&str>) -> Figure {
        Figure {
            id: Some(id.to_string()),
            caption: caption.map(|c| Caption {
                content: c.to_string(),
                spans: Vec::new(),
            }),
            spans: span.into_iter().collect(),
            bounding_regions: Vec::new(),
        }
    }

    #[test]
    fn page_number_from_id() {
        assert_eq!(figure_page_number("3.1"), 3);
        assert_eq!(figure_page_number("12"), 12);
        assert_eq!(figure_page_number("x.1"), 1);
        assert_eq!(figure_page_number(""), 1);
    }

    #[test]
    fn sanitizes_path_separators() {
        assert_eq!(sanitize_image_name("1.1"), "1.1.png");
        assert_eq!(sanitize_image_name("a/b\\c"), "a_b_c.png");
    }

    #[test]
    fn html_to_text_strips_and_decodes() {
        assert_eq!(
            html_to_text("<figure>\n<figcaption>Sales &amp; <b>costs</b></figcaption>\n</figure>"),
            "Sales & costs"
        );
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn caption_joins_both_sources() {
        assert_eq!(build_caption_text(" Figure 1 ", "<p>Revenue</p>"), "Figure 1 Revenue");
        assert_eq!(build_caption_text("", "<p>Revenue</p>"), "Revenue");
        assert_eq!(build_caption_text("Only", "<br/>"), "Only");
    }

    #[test]
    fn registry_matches_within_threshold() {
        let mut registry = ImageHashRegistry::new();
        registry.insert("0000000000000000".into(), PathBuf::from("a.png"));
        registry.insert("ffffffffffffffff".into(), PathBuf::from("b.png"));
        assert_eq!(
            registry.find_duplicate("00000000000000ff", 5),
            Some(Path::new("a.png"))
        );
        assert_eq!(registry.find_duplicate("0000000000ffffff", 5), None);
        assert_eq!(registry.find_duplicate("a.png", 0), None);
    }

    #[test]
    fn identical_images_are_saved_once() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = png(10);
        let source = MapSource(HashMap::from([("1.1", bytes.clone()), ("2.1", bytes)]));
        let content = "<figure>A</figure>\n<!-- PageBreak -->\n<figure>B</figure>";
        let result = AnalyzeResult {
            content: content.to_string(),
            figures: Some(vec![
                figure("1.1", Some(Span::new(0, 18)), Some("Logo")),
                figure("2.1", Some(Span::new(38, 18)), None),
            ]),
            ..Default::default()
        };
        let buffer = ContentBuffer::new(&result.content);
        let mut pages = crate::layout::splice::split_pages(content);
        let settings = LayoutSettings::default();

        let extractor = FigureExtractor::new(&settings, &source, dir.path()).unwrap();
        let figures = extractor.extract_all(&result, &buffer, &mut pages);

        assert_eq!(figures.len(), 2);
        assert!(!figures[0].duplicate);
        assert!(figures[1].duplicate);
        assert_eq!(figures[0].image_path, figures[1].image_path);
        assert_eq!(figures[1].relative_path, "images/1.1.png");
        assert_eq!(fs::read_dir(extractor.images_dir()).unwrap().count(), 1);

        assert_eq!(pages[0].content, "![Logo A](images/1.1.png)\n");
        assert_eq!(pages[1].content, "\n![B](images/1.1.png)");
    }

    #[test]
    fn distinct_images_are_both_saved() {
        let dir = tempfile::tempdir().unwrap();
        let source = MapSource(HashMap::from([("1.1", png(0)), ("1.2", png(255))]));
        let result = AnalyzeResult {
            content: "text".into(),
            figures: Some(vec![figure("1.1", None, None), figure("1.2", None, None)]),
            ..Default::default()
        };
        let buffer = ContentBuffer::new(&result.content);
        let mut pages = crate::layout::splice::split_pages("text");
        let settings = LayoutSettings::default();

        let extractor = FigureExtractor::new(&settings, &source, dir.path()).unwrap();
        let figures = extractor.extract_all(&result, &buffer, &mut pages);

        assert_eq!(figures.len(), 2);
        assert!(figures.iter().all(|f| !f.duplicate && f.anchored));
        assert_eq!(fs::read_dir(extractor.images_dir()).unwrap().count(), 2);
        assert_eq!(
            pages[0].content,
            "text\n\n![](images/1.1.png)\n\n![](images/1.2.png)\n"
        );
    }

    #[test]
    fn failed_fetch_and_undecodable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = MapSource(HashMap::from([
            ("1.1", b"not an image".to_vec()),
            ("1.2", b"not an image".to_vec()),
        ]));
        let result = AnalyzeResult {
            content: String::new(),
            figures: Some(vec![
                figure("1.1", None, None),
                figure("1.2", None, None),
                figure("1.3", None, None),
                Figure::default(),
            ]),
            ..Default::default()
        };
        let buffer = ContentBuffer::new(&result.content);
        let mut pages = crate::layout::splice::split_pages("");
        let settings = LayoutSettings::default();

        let extractor = FigureExtractor::new(&settings, &source, dir.path()).unwrap();
        let figures = extractor.extract_all(&result, &buffer, &mut pages);

        // 1.3 is missing from the source, the id-less figure is ignored;
        // undecodable bytes only dedupe against their own file name
        assert_eq!(figures.len(), 2);
        assert!(!figures[1].duplicate);
        assert_eq!(fs::read_dir(extractor.images_dir()).unwrap().count(), 2);
    }
}
