//! The Log view: a single accomplishment form, pre-fillable from a voice note.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::models::{normalize_date, parse_date, AccomplishmentFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogState {
    Idle,
    Prefilled,
    Edited,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogView {
    pub state: LogState,
    pub form: AccomplishmentFields,
}

/// Partial form update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogPatch {
    pub date: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub impact_metric: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
}

impl LogView {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            state: LogState::Idle,
            form: AccomplishmentFields {
                date: today.format("%Y-%m-%d").to_string(),
                ..Default::default()
            },
        }
    }

    /// Overwrites all six fields with values extracted from a voice note.
    /// A missing or unparseable date becomes `today`.
    pub fn prefill(&mut self, mut fields: AccomplishmentFields, today: NaiveDate) {
        fields.date = parse_date(&fields.date)
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string();
        self.form = fields;
        self.state = LogState::Prefilled;
    }

    pub fn edit(&mut self, patch: LogPatch) {
        let LogPatch {
            date,
            category,
            description,
            impact_metric,
            company,
            title,
        } = patch;
        let targets = [
            (date, &mut self.form.date),
            (category, &mut self.form.category),
            (description, &mut self.form.description),
            (impact_metric, &mut self.form.impact_metric),
            (company, &mut self.form.company),
            (title, &mut self.form.title),
        ];
        for (value, target) in targets {
            if let Some(value) = value {
                *target = value;
            }
        }
        self.state = LogState::Edited;
    }

    /// Checked before any store call. A valid date is rewritten as `YYYY-MM-DD`.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.form.description.trim().is_empty() {
            return Err("Description is required.".to_string());
        }
        self.form.date = normalize_date(&self.form.date)?;
        Ok(())
    }

    /// Resets after a successful submission. The date is kept for the next entry.
    pub fn clear(&mut self) {
        self.form = AccomplishmentFields {
            date: std::mem::take(&mut self.form.date),
            ..Default::default()
        };
        self.state = LogState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn extracted(date: &str) -> AccomplishmentFields {
        AccomplishmentFields {
            date: date.to_string(),
            category: "Tech".to_string(),
            description: "Led migration".to_string(),
            impact_metric: "cut costs 20%".to_string(),
            company: String::new(),
            title: String::new(),
        }
    }

    #[test]
    fn test_new_form_is_dated_today() {
        let view = LogView::new(today());
        assert_eq!(view.form.date, "2024-06-01");
        assert_eq!(view.state, LogState::Idle);
    }

    #[test]
    fn test_prefill_overwrites_everything() {
        let mut view = LogView::new(today());
        view.edit(LogPatch {
            company: Some("Initech".into()),
            ..Default::default()
        });
        view.prefill(extracted("2024-01-10"), today());

        assert_eq!(view.state, LogState::Prefilled);
        assert_eq!(view.form.date, "2024-01-10");
        assert_eq!(view.form.company, "");
        assert_eq!(view.form.description, "Led migration");
    }

    #[test]
    fn test_prefill_bad_date_becomes_today() {
        let mut view = LogView::new(today());
        view.prefill(extracted("last Tuesday"), today());
        assert_eq!(view.form.date, "2024-06-01");
    }

    #[test]
    fn test_edits_preserved_until_next_prefill() {
        let mut view = LogView::new(today());
        view.prefill(extracted("2024-01-10"), today());
        view.edit(LogPatch {
            description: Some("Led the Zephyr migration".into()),
            ..Default::default()
        });

        assert_eq!(view.state, LogState::Edited);
        assert_eq!(view.form.description, "Led the Zephyr migration");
        assert_eq!(view.form.impact_metric, "cut costs 20%");
    }

    #[test]
    fn test_validate_requires_description() {
        let mut view = LogView::new(today());
        assert!(view.validate().is_err());
        view.edit(LogPatch {
            description: Some("   ".into()),
            ..Default::default()
        });
        assert!(view.validate().is_err());
        view.edit(LogPatch {
            description: Some("Shipped".into()),
            ..Default::default()
        });
        assert!(view.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unparseable_date() {
        let mut view = LogView::new(today());
        view.edit(LogPatch {
            date: Some("not-a-date".into()),
            description: Some("Shipped".into()),
            ..Default::default()
        });
        let err = view.validate().unwrap_err();
        assert!(err.contains("not-a-date"));
        assert_eq!(view.form.date, "not-a-date");
    }

    #[test]
    fn test_validate_normalizes_date() {
        let mut view = LogView::new(today());
        view.edit(LogPatch {
            date: Some(" 2024-03-05 ".into()),
            description: Some("Shipped".into()),
            ..Default::default()
        });
        view.validate().unwrap();
        assert_eq!(view.form.date, "2024-03-05");
    }

    #[test]
    fn test_clear_keeps_date() {
        let mut view = LogView::new(today());
        view.prefill(extracted("2024-01-10"), today());
        view.clear();

        assert_eq!(view.state, LogState::Idle);
        assert_eq!(view.form.date, "2024-01-10");
        assert_eq!(view.form.description, "");
        assert_eq!(view.form.category, "");
    }
}
