use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Header row of the accomplishments table, in column order.
pub const HEADER: [&str; 8] = [
    "id",
    "date",
    "category",
    "description",
    "impact_metric",
    "company",
    "title",
    "user",
];

/// Column name appended to legacy headers during `init`.
pub const USER_COLUMN: &str = "user";

/// 1-based column of `date`, the first content column (B).
pub const FIRST_CONTENT_COLUMN: usize = 2;

/// Date formats accepted when sorting rows. Output is always `%Y-%m-%d`.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y"];

/// A single row of the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accomplishment {
    pub id: String,
    pub date: String,
    pub category: String,
    pub description: String,
    pub impact_metric: String,
    pub company: String,
    pub title: String,
    pub user: String,
}

impl Accomplishment {
    pub fn fields(&self) -> AccomplishmentFields {
        AccomplishmentFields {
            date: self.date.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            impact_metric: self.impact_metric.clone(),
            company: self.company.clone(),
            title: self.title.clone(),
        }
    }

    /// Tags parsed from the comma-separated `category` column.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.category
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// The user-editable content columns of an accomplishment (`B..G`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccomplishmentFields {
    pub date: String,
    pub category: String,
    pub description: String,
    pub impact_metric: String,
    pub company: String,
    pub title: String,
}

impl AccomplishmentFields {
    /// Content cells in column order, starting at [`FIRST_CONTENT_COLUMN`].
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.category.clone(),
            self.description.clone(),
            self.impact_metric.clone(),
            self.company.clone(),
            self.title.clone(),
        ]
    }
}

/// Parses a stored date, accepting a handful of common spreadsheet formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Rewrites an accepted date into the canonical `YYYY-MM-DD` cell form.
pub fn normalize_date(raw: &str) -> Result<String, String> {
    parse_date(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| format!("Invalid date '{}'. Use YYYY-MM-DD.", raw.trim()))
}

/// Maps a data row onto an [`Accomplishment`] using the header positions.
/// Missing trailing cells (and a missing `user` column) read as empty strings.
pub fn record_from_row(header: &[String], row: &[String]) -> Accomplishment {
    let cell = |name: &str| -> String {
        header
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| row.get(idx))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    Accomplishment {
        id: cell("id"),
        date: cell("date"),
        category: cell("category"),
        description: cell("description"),
        impact_metric: cell("impact_metric"),
        company: cell("company"),
        title: cell("title"),
        user: cell("user"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        HEADER.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(parse_date("2024-01-10"), Some(expected));
        assert_eq!(parse_date("2024/01/10"), Some(expected));
        assert_eq!(parse_date("01/10/2024"), Some(expected));
        assert_eq!(parse_date(" 2024-1-10 "), Some(expected));
        assert_eq!(parse_date("last spring"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date(" 2024-01-10 ").unwrap(), "2024-01-10");
        assert!(normalize_date("not-a-date").is_err());
        assert!(normalize_date("").is_err());
    }

    #[test]
    fn test_record_from_short_row() {
        let row = vec!["abc".to_string(), "2024-01-10".to_string()];
        let record = record_from_row(&header(), &row);
        assert_eq!(record.id, "abc");
        assert_eq!(record.date, "2024-01-10");
        assert_eq!(record.description, "");
        assert_eq!(record.user, "");
    }

    #[test]
    fn test_record_from_legacy_header_has_no_user() {
        let legacy: Vec<String> = HEADER[..7].iter().map(|h| h.to_string()).collect();
        let row: Vec<String> = (0..8).map(|i| format!("v{i}")).collect();
        let record = record_from_row(&legacy, &row);
        assert_eq!(record.title, "v6");
        assert_eq!(record.user, "");
    }

    #[test]
    fn test_tags_are_trimmed_and_non_empty() {
        let record = Accomplishment {
            id: "1".into(),
            date: String::new(),
            category: " Leadership, Tech ,, ".into(),
            description: "x".into(),
            impact_metric: String::new(),
            company: String::new(),
            title: String::new(),
            user: "alice".into(),
        };
        assert_eq!(record.tags().collect::<Vec<_>>(), vec!["Leadership", "Tech"]);
    }
}
