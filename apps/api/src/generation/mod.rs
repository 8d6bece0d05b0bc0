// Tailored resume and cover letter generation.
// Profiles come back from the completion client as JSON, are validated into a
// fixed schema, edited as a versioned draft and finally rendered to PDF.

pub mod draft;
pub mod generator;
pub mod handlers;
pub mod profile;
pub mod prompts;
pub mod view;
