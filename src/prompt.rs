//! Prompt templates and rendering.
//!
//! Templates use `{key}` placeholders. `{{` and `}}` produce literal braces.
//! Rendering is a single pass, so braces inside substituted values (article
//! text often has them) are never treated as placeholders.

/// System prompt shared by every quiz call.
pub const SYSTEM_PROMPT: &str =
    "You turn encyclopedia articles into structured JSON. Reply with JSON only.";

/// Extract title, summary, entities, and section headings.
pub const ANALYSIS_TEMPLATE: &str = "\
You are an assistant that analyzes Wikipedia articles to extract structured data.
Given the article text below (which may be truncated), extract the following as JSON:
1. title: Short article title.
2. summary: 2-4 sentence overview.
3. key_entities: with keys 'people', 'organizations', 'locations' as arrays of strings.
4. sections: ordered list of major section titles.

Return ONLY valid JSON with keys: title, summary, key_entities, sections.

Article text:
{article_text}
";

/// Generate the initial multiple-choice question list.
pub const QUIZ_TEMPLATE: &str = "\
You are a quiz generator for Wikipedia articles.
Using ONLY the factual content from the article text below, create a diverse quiz
of {target} multiple-choice questions.

For each question, output an object with keys:
 - question: the question text
 - options: an array of 4 answer options (strings)
 - answer: the exact text of the correct option
 - explanation: 1-2 sentence explanation grounded in the article
 - difficulty: one of 'easy', 'medium', 'hard'

Avoid hallucinations and do not use information that is not clearly supported by the text.
Return ONLY a JSON array of question objects.

Article text:
{article_text}
";

/// Suggest follow-up reading.
pub const RELATED_TOPICS_TEMPLATE: &str = "\
You are an assistant that suggests follow-up Wikipedia topics.
Based on the article text below, suggest 5 to 8 related Wikipedia article topics
that a learner should read next.

Return ONLY a JSON array of strings, each string being a Wikipedia topic title.

Article text:
{article_text}
";

/// Ask for the questions still missing after the first pass.
pub const MORE_QUESTIONS_TEMPLATE: &str = "\
The previous response contained some quiz questions but was missing {needed} questions.
Using ONLY the factual content from the article text below, provide exactly {needed} additional multiple-choice question objects (same schema as before).
Do NOT repeat questions already present in the existing JSON. Return ONLY a JSON array of the additional question objects.

Article text:
{article_text}

Existing questions JSON:
{existing_json}
";

/// Ask the model to fix a broken question list.
pub const REPAIR_QUIZ_TEMPLATE: &str = "\
The previous response was intended to be a JSON array of quiz question objects, but it was invalid.
Each object must have keys: question (string), options (array of 4 strings), answer (string), explanation (string), difficulty (easy|medium|hard).
Do NOT add any commentary. Return ONLY the corrected JSON array. Here is the broken response:
{broken_json}
";

/// Ask the model to fix a broken analysis object.
pub const REPAIR_ANALYSIS_TEMPLATE: &str = "\
The previous response was intended to be a JSON object with keys: title (string), summary (string), key_entities (object with arrays: people, organizations, locations), sections (array of strings).
Do NOT add any commentary. Return ONLY the corrected JSON object. Here is the broken response:
{broken_json}
";

/// Render a template, substituting `{key}` placeholders from `vars`.
///
/// Unknown placeholders are left as-is. Use `{{` to insert a literal `{` and
/// `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use wiki_quiz::prompt::render;
///
/// let result = render("Hello {name}, here is JSON: {{\"key\": \"val\"}}", &[("name", "Alice")]);
/// assert_eq!(result, r#"Hello Alice, here is JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            let value = tail[1..].find('}').and_then(|close| {
                let key = &tail[1..1 + close];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, close + 2))
            });
            match value {
                Some((v, consumed)) => {
                    out.push_str(v);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        let result = render("Hello {name}, process {input}", &[("name", "Alice"), ("input", "data")]);
        assert_eq!(result, "Hello Alice, process data");
    }

    #[test]
    fn test_render_no_placeholders() {
        assert_eq!(render("static prompt", &[]), "static prompt");
    }

    #[test]
    fn test_render_escaped_braces() {
        let result = render("Hello {name}, JSON: {{\"key\": \"val\"}}", &[("name", "Alice")]);
        assert_eq!(result, r#"Hello Alice, JSON: {"key": "val"}"#);
    }

    #[test]
    fn test_render_escaped_braces_no_substitution() {
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", &[]);
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_render_unknown_placeholder_kept() {
        assert_eq!(render("keep {missing} as is", &[]), "keep {missing} as is");
    }

    #[test]
    fn test_render_does_not_expand_inside_values() {
        let result = render(
            "{article_text} / {needed}",
            &[("article_text", "set {needed} = {x}"), ("needed", "4")],
        );
        assert_eq!(result, "set {needed} = {x} / 4");
    }

    #[test]
    fn test_more_questions_template_fills_every_slot() {
        let prompt = render(
            MORE_QUESTIONS_TEMPLATE,
            &[
                ("needed", "4"),
                ("article_text", "Rust is a language."),
                ("existing_json", "[]"),
            ],
        );
        assert!(prompt.contains("missing 4 questions"));
        assert!(prompt.contains("exactly 4 additional"));
        assert!(prompt.contains("Rust is a language."));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_repair_templates_embed_broken_text() {
        for template in [REPAIR_QUIZ_TEMPLATE, REPAIR_ANALYSIS_TEMPLATE] {
            let prompt = render(template, &[("broken_json", "[{\"question\": ")]);
            assert!(prompt.ends_with("[{\"question\": \n"));
        }
    }
}
