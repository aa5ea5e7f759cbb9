//! Default LLM prompts for enrichment and multimodal extraction.

/// System message sent with every enrichment request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that analyzes transcripts and documents and produces concise, factual insights. Never invent facts that are not present in the input.";

/// Default prompt for summarizing extracted text.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"Analyze the following content extracted from a file.

Provide:
1. A short summary (2-3 sentences) of what the content is about.
2. The key points, names, dates and decisions it mentions.
3. Any follow-up actions that are requested.

Content:
{content}

Respond in plain text with no preamble."#;

/// Default prompt for reading a document directly with a vision-capable model.
pub const DEFAULT_MULTIMODAL_PROMPT: &str = "Extract all text from this document. Return only the extracted text, preserving the original layout as much as possible. Do not add any explanations or commentary.";
