// Document rendering: profile -> HTML -> PDF.
// Failures are logged and surface as `None`; callers keep running.

pub mod converter;
pub mod font_metrics;
pub mod html;
pub mod markup;

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info};

use crate::generation::profile::GeneratedProfile;
use crate::render::converter::{PageLayout, PdfConverter, PrintPdfConverter};
use crate::render::html::{cover_letter_html, resume_html, ContactInfo};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Malformed document markup: {0}")]
    Markup(String),

    #[error("Document has no renderable text")]
    Empty,

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

#[derive(Clone)]
pub struct DocumentRenderer {
    converter: Arc<dyn PdfConverter>,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new(Arc::new(PrintPdfConverter))
    }
}

impl DocumentRenderer {
    pub fn new(converter: Arc<dyn PdfConverter>) -> Self {
        Self { converter }
    }

    pub fn cover_letter_pdf(
        &self,
        profile: &GeneratedProfile,
        contact: &ContactInfo,
        today: NaiveDate,
    ) -> Option<Bytes> {
        let html = cover_letter_html(profile, contact, today);
        self.convert("cover letter", &html, &PageLayout::cover_letter())
    }

    pub fn resume_pdf(&self, profile: &GeneratedProfile, contact: &ContactInfo) -> Option<Bytes> {
        let html = resume_html(profile, contact);
        self.convert("resume", &html, &PageLayout::resume())
    }

    fn convert(&self, what: &str, html: &str, layout: &PageLayout) -> Option<Bytes> {
        match self.converter.convert(html, layout) {
            Ok(pdf) => {
                info!("Rendered {what} PDF ({} bytes)", pdf.len());
                Some(Bytes::from(pdf))
            }
            Err(e) => {
                error!("Failed to render {what} PDF: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::draft::{DraftEdit, ProfileDraft};
    use crate::generation::profile::tests::sample_response;

    struct FailingConverter;

    impl PdfConverter for FailingConverter {
        fn convert(&self, _html: &str, _layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::Markup("broken".to_string()))
        }
    }

    fn contact() -> ContactInfo {
        ContactInfo {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..ContactInfo::default()
        }
    }

    fn pdf_text(pdf: &Bytes) -> String {
        pdf_extract::extract_text_from_mem(pdf).unwrap()
    }

    #[test]
    fn test_resume_pdf_contains_every_included_item() {
        let profile = GeneratedProfile::from_value(sample_response()).unwrap();
        let pdf = DocumentRenderer::default()
            .resume_pdf(&profile, &contact())
            .unwrap();
        let text = pdf_text(&pdf);

        for word in ["Lovelace", "Globex", "Initech", "Zephyr", "Quasar", "University"] {
            assert!(text.contains(word), "missing {word} in {text}");
        }
    }

    #[test]
    fn test_excluded_job_absent_from_resume_pdf() {
        let profile = GeneratedProfile::from_value(sample_response()).unwrap();
        let mut draft = ProfileDraft::new(profile, 1);
        draft
            .apply(1, &[DraftEdit::IncludeJob { job: 1, included: false }])
            .unwrap();

        let pdf = DocumentRenderer::default()
            .resume_pdf(&draft.finalize(), &contact())
            .unwrap();
        let text = pdf_text(&pdf);

        assert!(text.contains("Zephyr"));
        assert!(!text.contains("Initech"));
        assert!(!text.contains("Quasar"));
        assert!(!text.contains("reporting"));
    }

    #[test]
    fn test_cover_letter_pdf_renders_body() {
        let profile = GeneratedProfile::from_value(sample_response()).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let pdf = DocumentRenderer::default()
            .cover_letter_pdf(&profile, &contact(), today)
            .unwrap();
        let text = pdf_text(&pdf);

        assert!(text.contains("Sincerely"));
        assert!(text.contains("Zephyr"));
        assert!(text.contains("2024"));
    }

    #[test]
    fn test_converter_failure_is_none() {
        let renderer = DocumentRenderer::new(Arc::new(FailingConverter));
        let profile = GeneratedProfile::from_value(sample_response()).unwrap();
        assert!(renderer.resume_pdf(&profile, &contact()).is_none());
    }
}
