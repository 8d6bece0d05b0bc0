//! HTML templates for the cover letter and the resume.
//!
//! Output is XHTML (every element closed, only XML entities) so the converter
//! can parse it strictly. All interpolated text goes through `escape`.

use chrono::NaiveDate;
use pulldown_cmark::{html, Event, Parser};
use serde::{Deserialize, Serialize};

use crate::generation::profile::GeneratedProfile;

/// Contact details shown in the document header. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub linkedin: String,
}

impl ContactInfo {
    /// `email | phone | linkedin`, skipping blanks.
    pub fn contact_line(&self) -> String {
        [&self.email, &self.phone, &self.linkedin]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

const RESUME_CSS: &str = r#"
    @page { size: letter; margin: 2.0cm; }
    body { font-family: Helvetica, sans-serif; font-size: 11pt; line-height: 1.4; color: #333; }
    .header { text-align: center; margin-bottom: 20px; }
    .name { font-size: 24pt; font-weight: bold; color: #2c3e50; margin-bottom: 5px; }
    .contact-info { font-size: 10pt; color: #666; }
    h1 { font-size: 18pt; color: #2c3e50; border-bottom: 2px solid #2c3e50; padding-bottom: 5px; margin-top: 20px; margin-bottom: 15px; }
    h2 { font-size: 14pt; color: #2c3e50; margin-top: 15px; margin-bottom: 5px; font-weight: bold; }
    .job-meta { font-size: 10pt; color: #555; font-style: italic; margin-bottom: 5px; }
    ul { margin-top: 5px; padding-left: 20px; }
    li { margin-bottom: 3px; }
    .section-content { margin-bottom: 15px; }
    .school { font-weight: bold; font-size: 12pt; }
"#;

const COVER_LETTER_CSS: &str = r#"
    @page { size: letter; margin: 1.5cm; }
    body { font-family: Helvetica, sans-serif; font-size: 10.5pt; line-height: 1.3; color: #333; }
    .header { text-align: center; margin-bottom: 15px; }
    .name { font-size: 20pt; font-weight: bold; color: #2c3e50; margin-bottom: 5px; }
    .contact-info { font-size: 9pt; color: #666; }
    strong { font-weight: bold; }
    .section-content { margin-bottom: 15px; }
"#;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Markdown to HTML. Raw HTML in the source is emitted as text, never as markup.
fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn document(css: &str, body: &str) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"/><style>{css}</style></head><body>{body}</body></html>"
    )
}

fn contact_header(contact: &ContactInfo) -> String {
    format!(
        "<div class=\"header\"><div class=\"name\">{}</div><div class=\"contact-info\">{}</div></div>",
        escape(contact.name.trim()),
        escape(&contact.contact_line()),
    )
}

pub fn cover_letter_html(profile: &GeneratedProfile, contact: &ContactInfo, today: NaiveDate) -> String {
    let company = match profile.company.trim() {
        "" => "Hiring Manager",
        company => company,
    };

    let body = format!(
        "{header}\
        <div style=\"margin-top: 20px; margin-bottom: 15px;\">{date}</div>\
        <div style=\"margin-bottom: 15px;\"><strong>Hiring Team</strong><br/>{company}</div>\
        <div class=\"section-content\">{letter}</div>\
        <div style=\"margin-top: 30px;\">Sincerely,<br/><br/>{name}</div>",
        header = contact_header(contact),
        date = today.format("%B %d, %Y"),
        company = escape(company),
        letter = markdown_to_html(&profile.cover_letter),
        name = escape(contact.name.trim()),
    );
    document(COVER_LETTER_CSS, &body)
}

pub fn resume_html(profile: &GeneratedProfile, contact: &ContactInfo) -> String {
    let resume = &profile.resume;
    let mut body = contact_header(contact);

    body.push_str(&format!(
        "<h1>Professional Summary</h1><div class=\"section-content\">{}</div>",
        escape(&resume.professional_summary)
    ));

    body.push_str("<h1>Professional Experience</h1><div class=\"section-content\">");
    for job in &resume.experience {
        let bullets: String = job
            .accomplishments
            .iter()
            .map(|b| format!("<li>{}</li>", escape(b)))
            .collect();
        body.push_str(&format!(
            "<div class=\"job-entry\"><h2>{}</h2><div class=\"job-meta\">{} - {}</div><p>{}</p>",
            escape(&job.label),
            escape(&job.start_date),
            escape(&job.end_date),
            escape(&job.summary),
        ));
        if !bullets.is_empty() {
            body.push_str(&format!("<ul>{bullets}</ul>"));
        }
        body.push_str("</div>");
    }
    body.push_str("</div>");

    if !resume.education.is_empty() {
        body.push_str("<h1>Education</h1><div class=\"section-content\">");
        for degree in &resume.education {
            let degree_line = match degree.degree_line() {
                line if line.is_empty() => degree.label.clone(),
                line => line,
            };
            let dated = match degree.graduation_date.trim() {
                "" => escape(&degree_line),
                date => format!("{} - {}", escape(&degree_line), escape(date)),
            };
            let note = match degree.information_of_note.trim() {
                "" => String::new(),
                note => format!("<p><em>{}</em></p>", escape(note)),
            };
            body.push_str(&format!(
                "<div class=\"edu-entry\"><div class=\"school\">{}</div><div>{dated}</div>{note}</div>",
                escape(&degree.school),
            ));
        }
        body.push_str("</div>");
    }

    document(RESUME_CSS, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::profile::tests::sample_response;

    fn profile() -> GeneratedProfile {
        GeneratedProfile::from_value(sample_response()).unwrap()
    }

    fn contact() -> ContactInfo {
        ContactInfo {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            linkedin: "linkedin.com/in/ada".to_string(),
        }
    }

    #[test]
    fn test_contact_line_skips_blanks() {
        assert_eq!(contact().contact_line(), "ada@example.com | linkedin.com/in/ada");
        assert_eq!(ContactInfo::default().contact_line(), "");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("R&D <b>\"x\"</b>"), "R&amp;D &lt;b&gt;&quot;x&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_cover_letter_layout() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let html = cover_letter_html(&profile(), &contact(), today);
        assert!(html.contains("March 05, 2024"));
        assert!(html.contains("<strong>Hiring Team</strong><br/>Acme Corp"));
        assert!(html.contains("<strong>Zephyr</strong>"));
        assert!(html.contains("Sincerely,<br/><br/>Ada Lovelace"));
        assert!(html.contains("margin: 1.5cm"));
    }

    #[test]
    fn test_cover_letter_company_defaults() {
        let mut profile = profile();
        profile.company.clear();
        let html = cover_letter_html(&profile, &contact(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(html.contains("<br/>Hiring Manager</div>"));
    }

    #[test]
    fn test_cover_letter_raw_html_is_neutralised() {
        let mut profile = profile();
        profile.cover_letter = "Hello <script>alert(1)</script> team".to_string();
        let html = cover_letter_html(&profile, &contact(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_resume_sections() {
        let html = resume_html(&profile(), &contact());
        assert!(html.contains("<h1>Professional Summary</h1>"));
        assert!(html.contains("<h2>Senior Engineer, Globex</h2>"));
        assert!(html.contains("2021-03 - Present"));
        assert!(html.contains("<li>Led Zephyr migration</li>"));
        assert!(html.contains("BSc in Computer Science - 2017"));
        assert!(html.contains("margin: 2.0cm"));
    }

    #[test]
    fn test_resume_without_education_omits_section() {
        let mut profile = profile();
        profile.resume.education.clear();
        let html = resume_html(&profile, &contact());
        assert!(!html.contains("Education"));
    }

    #[test]
    fn test_interpolated_text_is_escaped() {
        let mut profile = profile();
        profile.resume.experience[0].label = "R&D <Lead>".to_string();
        let html = resume_html(&profile, &contact());
        assert!(html.contains("<h2>R&amp;D &lt;Lead&gt;</h2>"));
    }
}
