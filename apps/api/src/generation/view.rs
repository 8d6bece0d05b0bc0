//! Session-scoped state of the Generate view.
//!
//! empty → draft loaded → edited → finalized (two PDFs) → downloadable.
//! Loading a new profile replaces the draft, bumps the version and drops both PDFs.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;

use crate::generation::draft::{DraftEdit, DraftError, ProfileDraft};
use crate::generation::profile::GeneratedProfile;
use crate::render::html::ContactInfo;
use crate::render::DocumentRenderer;

pub const MARKDOWN_FILE_NAME: &str = "tailored_resume_and_cover_letter.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    /// Path segment used by the download route.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "resume" => Some(DocumentKind::Resume),
            "cover-letter" | "cover_letter" => Some(DocumentKind::CoverLetter),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover_letter",
        }
    }
}

#[derive(Debug, Default)]
pub struct GenerateView {
    version: u64,
    draft: Option<ProfileDraft>,
    contact: ContactInfo,
    finalized: Option<GeneratedProfile>,
    resume_pdf: Option<Bytes>,
    cover_letter_pdf: Option<Bytes>,
    markdown: Option<String>,
    notices: Vec<String>,
}

/// What the client sees of the view.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateSnapshot {
    pub version: u64,
    pub draft: Option<ProfileDraft>,
    pub contact: ContactInfo,
    pub finalized: Option<GeneratedProfile>,
    pub resume_ready: bool,
    pub cover_letter_ready: bool,
    pub markdown: Option<String>,
    pub notices: Vec<String>,
}

impl GenerateView {
    pub fn snapshot(&self) -> GenerateSnapshot {
        GenerateSnapshot {
            version: self.version,
            draft: self.draft.clone(),
            contact: self.contact.clone(),
            finalized: self.finalized.clone(),
            resume_ready: self.resume_pdf.is_some(),
            cover_letter_ready: self.cover_letter_pdf.is_some(),
            markdown: self.markdown.clone(),
            notices: self.notices.clone(),
        }
    }

    /// Replaces the draft with a freshly generated profile.
    pub fn load_profile(&mut self, profile: GeneratedProfile, contact: ContactInfo) {
        self.version += 1;
        self.draft = Some(ProfileDraft::new(profile, self.version));
        self.contact = contact;
        self.finalized = None;
        self.resume_pdf = None;
        self.cover_letter_pdf = None;
        self.notices.clear();
    }

    pub fn set_markdown(&mut self, markdown: String) {
        self.markdown = Some(markdown);
    }

    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref()
    }

    /// Contact details used by the next finalize.
    pub fn set_contact(&mut self, contact: ContactInfo) {
        self.contact = contact;
    }

    /// Applies edits to the current draft. `None` when nothing has been generated yet.
    pub fn apply_edits(
        &mut self,
        version: u64,
        edits: &[DraftEdit],
    ) -> Option<Result<&ProfileDraft, DraftError>> {
        let draft = self.draft.as_mut()?;
        match draft.apply(version, edits) {
            Ok(()) => Some(Ok(&*draft)),
            Err(e) => Some(Err(e)),
        }
    }

    /// Assembles the included items and renders both documents.
    ///
    /// A failed render leaves that document unset and records a notice; the other
    /// document and the assembled profile are kept. `None` when there is no draft.
    pub fn finalize(&mut self, renderer: &DocumentRenderer, today: NaiveDate) -> Option<&GeneratedProfile> {
        let profile = self.draft.as_ref()?.finalize();

        self.notices.clear();
        self.resume_pdf = renderer.resume_pdf(&profile, &self.contact);
        if self.resume_pdf.is_none() {
            self.notices
                .push("Resume PDF could not be generated. Try editing the content and finalizing again.".to_string());
        }
        self.cover_letter_pdf = renderer.cover_letter_pdf(&profile, &self.contact, today);
        if self.cover_letter_pdf.is_none() {
            self.notices.push(
                "Cover letter PDF could not be generated. Try editing the content and finalizing again."
                    .to_string(),
            );
        }

        self.finalized = Some(profile);
        self.finalized.as_ref()
    }

    pub fn pdf(&self, kind: DocumentKind) -> Option<Bytes> {
        match kind {
            DocumentKind::Resume => self.resume_pdf.clone(),
            DocumentKind::CoverLetter => self.cover_letter_pdf.clone(),
        }
    }

    /// `{user}_{company}_{resume|cover_letter}.pdf`, each part sanitized.
    pub fn file_name(&self, kind: DocumentKind, user: &str) -> String {
        let company = self
            .finalized
            .as_ref()
            .map(|p| p.company.as_str())
            .unwrap_or_default();
        let stem: Vec<String> = [user, company]
            .into_iter()
            .map(sanitize_part)
            .filter(|part| !part.is_empty())
            .collect();
        let stem = if stem.is_empty() {
            "careeros".to_string()
        } else {
            stem.join("_")
        };
        format!("{stem}_{}.pdf", kind.suffix())
    }
}

/// Lower-cases and drops every non-alphanumeric character.
pub fn sanitize_part(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
