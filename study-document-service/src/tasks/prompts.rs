use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::models::PDF_MEDIA_TYPE;

const ROLE: &str = "You are an expert educator and content simplifier.";

const REQUIREMENTS: &str = r#"CRITICAL REQUIREMENTS:
1. **Start with "What This Shows"** - Begin with a clear overview of what the content is about
2. **Use Simple Analogies** - Compare complex concepts to everyday things (like "think of this as cooking" or "like organizing your closet")
3. **Break Down Into Clear Sections** - Organize content with numbered sections and descriptive headings
4. **Explain Every Term** - Don't assume the reader knows technical terms. Define everything simply
5. **Provide Real Examples** - For every concept, give concrete, relatable examples
6. **Use "Think of it as..." phrases** - Help readers visualize abstract concepts
7. **End with "Why This Matters"** - Explain the practical importance and real-world applications"#;

const STRUCTURE: &str = r#"STRUCTURE TO FOLLOW:
1. **What This Shows** - Overview paragraph explaining the main topic and purpose
2. **Main Sections** - Break content into 3-5 major sections with clear headings
3. **For each section:**
   - Simple explanation in everyday language
   - Real-world analogy or comparison
   - Specific examples that relate to the reader's experience
   - Break down any sub-concepts with bullet points
4. **Key Terms Explained** - Define important vocabulary in simple terms
5. **Why This Matters** - Practical applications and importance"#;

const VISUALS: &str = r#"VISUAL CONTENT:
- Describe every image, diagram, chart and table in the document
- Explain what each visual shows and how it connects to the surrounding text
- Walk through charts and tables step by step: what is measured, what the trend or comparison means
- Treat diagrams as maps: name the parts, then explain how they relate to each other"#;

const STYLE: &str = r#"WRITING STYLE:
- Use "you" to address the reader directly
- Write like you're explaining to a friend who's never heard of this topic
- Use short sentences and paragraphs
- Include phrases like "Think of this as...", "Imagine if...", "This is like..."
- Make connections to everyday experiences
- Explain the "why" behind every concept, not just the "what""#;

const QUALITY: &str = r#"EXAMPLE QUALITY LEVEL:
Your explanations should be as detailed and accessible as this example:
"Think of data preprocessing as preparing ingredients for cooking. Just like you wash vegetables, remove bad parts, and cut them into the right sizes before cooking, data preprocessing involves cleaning your raw data (removing errors), filling in missing pieces (like filling gaps in a recipe), and organizing it in a way that makes sense for your computer to understand.""#;

const CLOSING: &str = "Create a detailed, engaging study document that makes this content completely accessible to someone learning it for the first time. Remember: if a concept can't be explained simply, it's not understood well enough - so break everything down to its simplest form.";

/// Prompt for the text-extraction path with `extracted` interpolated.
pub fn text_prompt(extracted: &str) -> String {
    format!(
        "\n{ROLE} Transform the following PDF content into a comprehensive, detailed study document that explains everything in simple terms with real-world examples.\n\n\
{REQUIREMENTS}\n\n{STRUCTURE}\n\n{STYLE}\n\n{QUALITY}\n\n\
Here's the PDF content to transform:\n\n{extracted}\n\n{CLOSING}\n"
    )
}

/// Prompt for the direct-attachment path; the document travels alongside it.
pub fn multimodal_prompt() -> String {
    format!(
        "\n{ROLE} Analyze the attached PDF - its text and every image, diagram, chart and table - and transform it into a comprehensive, detailed study document that explains everything in simple terms with real-world examples.\n\n\
{REQUIREMENTS}\n\n{STRUCTURE}\n\n{VISUALS}\n\n{STYLE}\n\n{QUALITY}\n\n{CLOSING}\n"
    )
}

/// Binary payload sent next to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    /// Base64 (standard alphabet) encoded content.
    pub data: String,
}

impl Attachment {
    pub fn pdf(bytes: &[u8]) -> Self {
        Self {
            mime_type: PDF_MEDIA_TYPE.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// What gets sent to the model for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    attachment: Option<Attachment>,
}

impl GenerationRequest {
    pub fn text_only(prompt: String) -> Self {
        Self {
            prompt,
            attachment: None,
        }
    }

    pub fn with_attachment(prompt: String, attachment: Attachment) -> Self {
        Self {
            prompt,
            attachment: Some(attachment),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_prompt_interpolates_content_once() {
        let prompt = text_prompt("Hello world");
        assert_eq!(prompt.matches("Hello world").count(), 1);
        assert!(prompt.contains("Here's the PDF content to transform:\n\nHello world\n"));
    }

    #[test]
    fn both_templates_mandate_the_document_structure() {
        for prompt in [text_prompt("x"), multimodal_prompt()] {
            assert!(prompt.contains("What This Shows"));
            assert!(prompt.contains("3-5 major sections"));
            assert!(prompt.contains("Real-world analogy"));
            assert!(prompt.contains("Key Terms Explained"));
            assert!(prompt.contains("Why This Matters"));
        }
    }

    #[test]
    fn only_multimodal_template_asks_for_visuals() {
        assert!(multimodal_prompt().contains("diagram, chart and table"));
        assert!(!text_prompt("x").contains("VISUAL CONTENT"));
    }

    #[test]
    fn pdf_attachment_is_base64_encoded() {
        let attachment = Attachment::pdf(b"%PDF-1.4");
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.data, "JVBERi0xLjQ=");
    }

    #[test]
    fn request_constructors() {
        let text = GenerationRequest::text_only("p".into());
        assert!(text.attachment().is_none());

        let multimodal = GenerationRequest::with_attachment("p".into(), Attachment::pdf(b"x"));
        assert_eq!(multimodal.prompt(), "p");
        assert!(multimodal.attachment().is_some());
    }
}
