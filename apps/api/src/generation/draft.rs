//! The review buffer for a generated profile.
//!
//! Every job and bullet carries an explicit `included` flag and is addressed by
//! its position, which never changes for the life of a draft. A regeneration
//! replaces the whole draft and bumps `version`, so edits made against an
//! older version can be detected and refused.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::profile::{Degree, FitScore, GeneratedProfile, Job, ResumeSection};

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("Draft version {submitted} is stale; the current version is {current}")]
    StaleVersion { submitted: u64, current: u64 },

    #[error("No job at index {0}")]
    JobOutOfRange(usize),

    #[error("No bullet at index {bullet} for job {job}")]
    BulletOutOfRange { job: usize, bullet: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulletDraft {
    pub included: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDraft {
    pub index: usize,
    pub included: bool,
    pub label: String,
    pub start_date: String,
    pub end_date: String,
    pub summary: String,
    pub bullets: Vec<BulletDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileDraft {
    pub version: u64,
    pub fit_score: FitScore,
    pub company: String,
    pub job_title: String,
    pub cover_letter: String,
    pub professional_summary: String,
    pub jobs: Vec<JobDraft>,
    pub education: Vec<Degree>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Company,
    JobTitle,
    CoverLetter,
    ProfessionalSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobField {
    Label,
    StartDate,
    EndDate,
    Summary,
}

/// One change to a draft. Indices refer to `JobDraft::index` and bullet position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DraftEdit {
    SetField { field: DraftField, value: String },
    IncludeJob { job: usize, included: bool },
    SetJobField { job: usize, field: JobField, value: String },
    IncludeBullet { job: usize, bullet: usize, included: bool },
    SetBullet { job: usize, bullet: usize, text: String },
}

impl ProfileDraft {
    /// Loads a validated profile with everything included.
    pub fn new(profile: GeneratedProfile, version: u64) -> Self {
        let jobs = profile
            .resume
            .experience
            .into_iter()
            .enumerate()
            .map(|(index, job)| JobDraft {
                index,
                included: true,
                label: job.label,
                start_date: job.start_date,
                end_date: job.end_date,
                summary: job.summary,
                bullets: job
                    .accomplishments
                    .into_iter()
                    .map(|text| BulletDraft {
                        included: true,
                        text,
                    })
                    .collect(),
            })
            .collect();

        ProfileDraft {
            version,
            fit_score: profile.fit_score,
            company: profile.company,
            job_title: profile.job_title,
            cover_letter: profile.cover_letter,
            professional_summary: profile.resume.professional_summary,
            jobs,
            education: profile.resume.education,
        }
    }

    /// Applies a batch of edits against `version`. The batch is all-or-nothing.
    pub fn apply(&mut self, version: u64, edits: &[DraftEdit]) -> Result<(), DraftError> {
        if version != self.version {
            return Err(DraftError::StaleVersion {
                submitted: version,
                current: self.version,
            });
        }

        let mut next = self.clone();
        for edit in edits {
            next.apply_one(edit)?;
        }
        *self = next;
        Ok(())
    }

    fn apply_one(&mut self, edit: &DraftEdit) -> Result<(), DraftError> {
        match edit {
            DraftEdit::SetField { field, value } => {
                let target = match field {
                    DraftField::Company => &mut self.company,
                    DraftField::JobTitle => &mut self.job_title,
                    DraftField::CoverLetter => &mut self.cover_letter,
                    DraftField::ProfessionalSummary => &mut self.professional_summary,
                };
                *target = value.clone();
            }
            DraftEdit::IncludeJob { job, included } => {
                self.job_mut(*job)?.included = *included;
            }
            DraftEdit::SetJobField { job, field, value } => {
                let job = self.job_mut(*job)?;
                let target = match field {
                    JobField::Label => &mut job.label,
                    JobField::StartDate => &mut job.start_date,
                    JobField::EndDate => &mut job.end_date,
                    JobField::Summary => &mut job.summary,
                };
                *target = value.clone();
            }
            DraftEdit::IncludeBullet {
                job,
                bullet,
                included,
            } => {
                self.bullet_mut(*job, *bullet)?.included = *included;
            }
            DraftEdit::SetBullet { job, bullet, text } => {
                self.bullet_mut(*job, *bullet)?.text = text.clone();
            }
        }
        Ok(())
    }

    fn job_mut(&mut self, job: usize) -> Result<&mut JobDraft, DraftError> {
        self.jobs.get_mut(job).ok_or(DraftError::JobOutOfRange(job))
    }

    fn bullet_mut(&mut self, job: usize, bullet: usize) -> Result<&mut BulletDraft, DraftError> {
        self.job_mut(job)?
            .bullets
            .get_mut(bullet)
            .ok_or(DraftError::BulletOutOfRange { job, bullet })
    }

    /// Assembles the profile that gets rendered: excluded jobs vanish whole,
    /// excluded or blank bullets are dropped.
    pub fn finalize(&self) -> GeneratedProfile {
        let experience = self
            .jobs
            .iter()
            .filter(|job| job.included)
            .map(|job| Job {
                label: job.label.clone(),
                start_date: job.start_date.clone(),
                end_date: job.end_date.clone(),
                summary: job.summary.clone(),
                accomplishments: job
                    .bullets
                    .iter()
                    .filter(|b| b.included && !b.text.trim().is_empty())
                    .map(|b| b.text.clone())
                    .collect(),
            })
            .collect();

        GeneratedProfile {
            fit_score: self.fit_score,
            company: self.company.clone(),
            job_title: self.job_title.clone(),
            cover_letter: self.cover_letter.clone(),
            resume: ResumeSection {
                professional_summary: self.professional_summary.clone(),
                experience,
                education: self.education.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::profile::tests::sample_response;
    use serde_json::json;

    fn draft() -> ProfileDraft {
        ProfileDraft::new(GeneratedProfile::from_value(sample_response()).unwrap(), 1)
    }

    #[test]
    fn test_new_draft_includes_everything() {
        let draft = draft();
        assert_eq!(draft.jobs.len(), 2);
        assert!(draft.jobs.iter().all(|j| j.included));
        assert!(draft.jobs[0].bullets.iter().all(|b| b.included));
        assert_eq!(draft.jobs[1].index, 1);
    }

    #[test]
    fn test_untouched_draft_finalizes_to_original() {
        let profile = GeneratedProfile::from_value(sample_response()).unwrap();
        let draft = ProfileDraft::new(profile.clone(), 1);
        assert_eq!(draft.finalize(), profile);
    }

    #[test]
    fn test_excluded_job_removed_whole() {
        let mut draft = draft();
        draft
            .apply(1, &[DraftEdit::IncludeJob { job: 0, included: false }])
            .unwrap();

        let profile = draft.finalize();
        assert_eq!(profile.resume.experience.len(), 1);
        assert_eq!(profile.resume.experience[0].label, "Engineer, Initech");
    }

    #[test]
    fn test_bullet_toggle_and_text_edit() {
        let mut draft = draft();
        draft
            .apply(
                1,
                &[
                    DraftEdit::IncludeBullet {
                        job: 0,
                        bullet: 1,
                        included: false,
                    },
                    DraftEdit::SetBullet {
                        job: 0,
                        bullet: 0,
                        text: "Led the Zephyr migration to Postgres".to_string(),
                    },
                    DraftEdit::SetField {
                        field: DraftField::Company,
                        value: "Acme".to_string(),
                    },
                ],
            )
            .unwrap();

        let profile = draft.finalize();
        assert_eq!(profile.company, "Acme");
        assert_eq!(
            profile.resume.experience[0].accomplishments,
            vec!["Led the Zephyr migration to Postgres"]
        );
    }

    #[test]
    fn test_stale_version_rejected() {
        let mut draft = draft();
        let err = draft
            .apply(0, &[DraftEdit::IncludeJob { job: 0, included: false }])
            .unwrap_err();
        assert_eq!(err, DraftError::StaleVersion { submitted: 0, current: 1 });
        assert!(draft.jobs[0].included);
    }

    #[test]
    fn test_failed_batch_leaves_draft_untouched() {
        let mut draft = draft();
        let err = draft
            .apply(
                1,
                &[
                    DraftEdit::IncludeJob { job: 0, included: false },
                    DraftEdit::SetBullet {
                        job: 1,
                        bullet: 9,
                        text: "x".to_string(),
                    },
                ],
            )
            .unwrap_err();
        assert_eq!(err, DraftError::BulletOutOfRange { job: 1, bullet: 9 });
        assert!(draft.jobs[0].included);
    }

    #[test]
    fn test_edit_wire_format() {
        let edit: DraftEdit = serde_json::from_value(json!({
            "op": "set_job_field", "job": 1, "field": "end_date", "value": "2022-12"
        }))
        .unwrap();
        assert_eq!(
            edit,
            DraftEdit::SetJobField {
                job: 1,
                field: JobField::EndDate,
                value: "2022-12".to_string()
            }
        );
    }
}
