// Prompt text and user-facing strings for the advisor chat.

/// System message pre-filled in the chat tab.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a Job Advisor Chatbot.";

/// Status shown on the upload tab after a resume is stored.
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Resume uploaded successfully! now click on chat with \
    job advisor right above this tab to start chatting!";

/// Prefixes the user's message with the resume text.
///
/// Layout: `Resume:\n{resume}\n\nUser message:\n{message}`. An empty resume still
/// renders its header so the model sees a consistent shape.
pub fn render_resume_prompt(resume_text: &str, user_message: &str) -> String {
    format!("Resume:\n{resume_text}\n\nUser message:\n{user_message}")
}
