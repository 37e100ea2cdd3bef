//! Prompt builders for the two generation calls.
//!
//! The proxy pairs each request's `promptVersion` with its own system
//! prompt; these builders produce the user-visible part.

/// Prompt for the upstream structure-detection call.
pub fn build_structure_prompt(text: &str, total_pages: usize) -> String {
    format!(
        r#"Analyze the following text extracted from a {total_pages}-page PDF.

Identify the STRUCTURE of the document and return ONLY valid JSON:

{{
  "title": "Document title",
  "author": null,
  "sections": [
    {{ "id": 1, "title": "Chapter or part name", "level": 1, "parentId": null }},
    {{ "id": 2, "title": "Subsection name", "level": 2, "parentId": 1 }}
  ]
}}

RULES:
- level 1 = chapter or main part, level 2 = section, level 3 = subsection
- Use the index/table of contents if one exists
- If there is no formal index, infer sections from headings and topic shifts
- Include ALL sections you can identify (at minimum the main ones)
- The JSON must be valid and parseable

TEXT:
{text}"#
    )
}

/// Prompt for one section's study guide.
pub fn build_study_guide_prompt(
    section_title: &str,
    section_text: &str,
    document_title: &str,
    all_section_titles: &[String],
    truncated: bool,
) -> String {
    let truncation_note = if truncated {
        "\nNOTE: The text was truncated because the section is very long. Work with what is available."
    } else {
        ""
    };

    format!(
        r#"Create a study guide for this section.

DOCUMENT: "{document_title}"
SECTION: "{section_title}"
OTHER SECTIONS: {titles}
{truncation_note}
Return ONLY valid JSON:

{{
  "relevance": "core",
  "summary": "Conceptual summary in 2-3 clear sentences.",
  "keyConcepts": ["concept 1", "concept 2", "concept 3"],
  "expandedExplanation": "A didactic explanation of 3-5 paragraphs, clearer than the original text. Separate paragraphs with a double newline.",
  "connections": ["Relation to 'another section': how they connect"],
  "quiz": [
    {{ "question": "Conceptual question", "answer": "Clear answer" }},
    {{ "question": "Conceptual question", "answer": "Clear answer" }},
    {{ "question": "Conceptual question", "answer": "Clear answer" }}
  ]
}}

"relevance" CRITERIA:
- "core": fundamental concept, the rest cannot be understood without it
- "supporting": reinforces core concepts, important but not essential
- "detail": examples, particular cases, specific data

SECTION TEXT:
{section_text}"#,
        titles = all_section_titles.join(" | "),
    )
}
