// Prompt templates for resume and cover-letter generation.
// The raw-JSON instruction is appended by llm_client, not here.

pub const DEFAULT_TARGET_AUDIENCE: &str = "Recruiters";

/// Structured generation. Replace `{job_description}` and `{target_audience}` before sending.
pub const STRUCTURED_PROMPT_TEMPLATE: &str = r#"You are an expert Career Coach and Professional Resume Writer.

TASK: Create both a tailored resume and a tailored cover letter that align the provided career accomplishments with the requirements and responsibilities found in the Job Description below, and rate how well the candidate fits the role.

JOB DESCRIPTION:
{job_description}

TARGET AUDIENCE: {target_audience}

INSTRUCTIONS FOR RESUME:
1. Select and emphasize the most relevant accomplishments from the context.
2. Use industry keywords from the job description.
3. Focus on quantifiable impact metrics where available.
4. Group accomplishments under the job (company and title) they were achieved in, most recent job first.
5. Maintain a professional, high-impact tone.

INSTRUCTIONS FOR COVER LETTER:
1. Write a compelling cover letter that demonstrates how the experience matches the job requirements.
2. Reference specific accomplishments from the career history.
3. Keep it concise (3-4 paragraphs) and professional, with a clear call to action.
4. Do not include a salutation, date or sign-off; those are added when the letter is laid out.
5. Markdown emphasis is allowed; headings are not.

OUTPUT FORMAT:
Return a JSON object with exactly these keys:
{
  "Fit Score": "Low | Medium | High",
  "Company": "Hiring company name from the job description",
  "Job Title": "Job title from the job description",
  "Cover Letter": "Cover letter body",
  "Resume": {
    "Professional Summary": "Two to four sentence summary",
    "Experience": {
      "<Job title>, <Company>": {
        "Start Date": "YYYY-MM or as known",
        "End Date": "YYYY-MM or Present",
        "Summary": "One sentence on the scope of the role",
        "Accomplishments": ["Bullet one", "Bullet two"]
      }
    },
    "Education": {
      "<Degree label>": {
        "Type of Degree": "",
        "Major": "",
        "School": "",
        "Graduation Date": "",
        "Information of Note": ""
      }
    }
  }
}
Omit "Education" entries entirely if the context contains none."#;

/// Plain-text mode: a single Markdown document with both assets.
pub const MARKDOWN_PROMPT_TEMPLATE: &str = r###"You are an expert Career Coach and Professional Resume Writer.

TASK: Create both a tailored resume and a tailored cover letter that align the provided career accomplishments with the requirements and responsibilities found in the Job Description below.

JOB DESCRIPTION:
{job_description}

TARGET AUDIENCE: {target_audience}

INSTRUCTIONS FOR RESUME:
1. Select and emphasize the most relevant accomplishments from the context.
2. Use industry keywords from the job description.
3. Focus on quantifiable impact metrics where available.
4. Maintain a professional, high-impact tone.
5. Structure the resume clearly with headers (e.g., Professional Summary, Experience, Skills).

INSTRUCTIONS FOR COVER LETTER:
1. Write a compelling cover letter that demonstrates how your experience matches the job requirements.
2. Reference specific accomplishments from your career history that align with the job description.
3. Show enthusiasm for the role and company.
4. Keep it concise (3-4 paragraphs) and professional.
5. Include a clear call to action.

OUTPUT FORMAT:
Please structure your response with two clear sections:
1. "## Tailored Resume" - followed by the resume content
2. "## Tailored Cover Letter" - followed by the cover letter content"###;

/// Fills a generation template. A blank audience falls back to the default.
pub fn render_prompt(template: &str, job_description: &str, target_audience: &str) -> String {
    let audience = match target_audience.trim() {
        "" => DEFAULT_TARGET_AUDIENCE,
        audience => audience,
    };
    template
        .replace("{target_audience}", audience)
        .replace("{job_description}", job_description.trim())
}
