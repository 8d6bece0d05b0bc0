//! The generated resume/cover-letter profile and its validation on receipt.
//!
//! The model's JSON is untrusted: required keys are checked up front, text
//! fields are coerced to strings, and `Experience` / `Education` are accepted
//! either as an ordered object or as an array of labelled objects.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub const TOP_LEVEL_KEYS: [&str; 5] = ["Fit Score", "Company", "Job Title", "Cover Letter", "Resume"];
pub const RESUME_KEYS: [&str; 2] = ["Professional Summary", "Experience"];

/// Keys tried, in order, for the label of an entry delivered as an array element.
const LABEL_KEYS: [&str; 6] = ["Label", "Job", "Role", "Position", "Title", "Degree"];

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("Model response is not a JSON object")]
    NotAnObject,

    #[error("Model response is missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Unrecognised fit score: {0:?}")]
    InvalidFitScore(String),

    #[error("Invalid {section} section: {message}")]
    InvalidSection { section: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitScore {
    Low,
    Medium,
    High,
}

impl FitScore {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(FitScore::Low),
            "medium" => Some(FitScore::Medium),
            "high" => Some(FitScore::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedProfile {
    #[serde(rename = "Fit Score")]
    pub fit_score: FitScore,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Job Title")]
    pub job_title: String,
    #[serde(rename = "Cover Letter")]
    pub cover_letter: String,
    #[serde(rename = "Resume")]
    pub resume: ResumeSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeSection {
    #[serde(rename = "Professional Summary")]
    pub professional_summary: String,
    #[serde(rename = "Experience", serialize_with = "serialize_labelled")]
    pub experience: Vec<Job>,
    #[serde(rename = "Education", serialize_with = "serialize_labelled")]
    pub education: Vec<Degree>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Start Date")]
    pub start_date: String,
    #[serde(rename = "End Date")]
    pub end_date: String,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Accomplishments")]
    pub accomplishments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degree {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Type of Degree")]
    pub degree_type: String,
    #[serde(rename = "Major")]
    pub major: String,
    #[serde(rename = "School")]
    pub school: String,
    #[serde(rename = "Graduation Date")]
    pub graduation_date: String,
    #[serde(rename = "Information of Note")]
    pub information_of_note: String,
}

impl Degree {
    /// `"{type} in {major}"`, or whichever half exists.
    pub fn degree_line(&self) -> String {
        match (self.degree_type.trim(), self.major.trim()) {
            ("", "") => String::new(),
            (kind, "") => kind.to_string(),
            ("", major) => major.to_string(),
            (kind, major) => format!("{kind} in {major}"),
        }
    }
}

trait Labelled {
    fn label(&self) -> &str;
}

impl Labelled for Job {
    fn label(&self) -> &str {
        &self.label
    }
}

impl Labelled for Degree {
    fn label(&self) -> &str {
        &self.label
    }
}

/// Writes entries back out in the wire shape: an ordered `label -> entry` object.
fn serialize_labelled<T, S>(entries: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    T: Labelled + Serialize,
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for entry in entries {
        map.serialize_entry(entry.label(), entry)?;
    }
    map.end()
}

impl GeneratedProfile {
    /// Validates and coerces a model response into the fixed schema.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        let Value::Object(root) = value else {
            return Err(ProfileError::NotAnObject);
        };

        let mut missing: Vec<String> = TOP_LEVEL_KEYS
            .iter()
            .filter(|k| !root.contains_key(**k))
            .map(|k| k.to_string())
            .collect();

        let resume = root.get("Resume");
        if let Some(resume) = resume {
            let Value::Object(resume) = resume else {
                return Err(ProfileError::InvalidSection {
                    section: "Resume".to_string(),
                    message: "expected an object".to_string(),
                });
            };
            missing.extend(
                RESUME_KEYS
                    .iter()
                    .filter(|k| !resume.contains_key(**k))
                    .map(|k| format!("Resume.{k}")),
            );
        }
        if !missing.is_empty() {
            return Err(ProfileError::MissingKeys(missing));
        }

        let raw_score = text(root.get("Fit Score"));
        let fit_score =
            FitScore::parse(&raw_score).ok_or(ProfileError::InvalidFitScore(raw_score))?;

        let resume = resume.and_then(Value::as_object).cloned().unwrap_or_default();
        let experience = labelled_entries(resume.get("Experience"), "Experience", job_from_map)?;
        let education = match resume.get("Education") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
            section => labelled_entries(section, "Education", degree_from_map)?,
        };

        Ok(GeneratedProfile {
            fit_score,
            company: text(root.get("Company")),
            job_title: text(root.get("Job Title")),
            cover_letter: text(root.get("Cover Letter")),
            resume: ResumeSection {
                professional_summary: text(resume.get("Professional Summary")),
                experience,
                education,
            },
        })
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

fn labelled_entries<T>(
    section: Option<&Value>,
    name: &str,
    build: fn(String, &Map<String, Value>) -> T,
) -> Result<Vec<T>, ProfileError> {
    let invalid = |message: String| ProfileError::InvalidSection {
        section: name.to_string(),
        message,
    };

    match section {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(label, entry)| match entry {
                Value::Object(fields) => Ok(build(label.clone(), fields)),
                _ => Err(invalid(format!("entry {label:?} is not an object"))),
            })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Value::Object(fields) => {
                    let label = LABEL_KEYS
                        .iter()
                        .map(|k| text(fields.get(*k)))
                        .find(|l| !l.is_empty())
                        .unwrap_or_else(|| format!("{name} {}", i + 1));
                    Ok(build(label, fields))
                }
                _ => Err(invalid(format!("item {} is not an object", i + 1))),
            })
            .collect(),
        _ => Err(invalid("expected an object or an array".to_string())),
    }
}

fn job_from_map(label: String, fields: &Map<String, Value>) -> Job {
    let accomplishments = match fields.get("Accomplishments") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .filter(|b| !b.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*']).trim().to_string())
            .filter(|b| !b.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Job {
        label,
        start_date: text(fields.get("Start Date")),
        end_date: text(fields.get("End Date")),
        summary: text(fields.get("Summary")),
        accomplishments,
    }
}

fn degree_from_map(label: String, fields: &Map<String, Value>) -> Degree {
    Degree {
        label,
        degree_type: text(fields.get("Type of Degree")),
        major: text(fields.get("Major")),
        school: text(fields.get("School")),
        graduation_date: text(fields.get("Graduation Date")),
        information_of_note: text(fields.get("Information of Note")),
    }
}
