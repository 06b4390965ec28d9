//! Constrained-output prompting strategies
//!
//! Four single-shot strategies over the inference gateway. Each
//! composes a prompt template, runs one non-streaming generation, and
//! post-processes the raw reply. Stateless.

use serde_json::Value;

use crate::gateway::InferenceClient;
use crate::{Error, Result};

/// Default temperature for structured extraction
pub const STRUCTURED_TEMPERATURE: f64 = 0.2;

/// Default temperature for constrained short text
pub const SHORT_TEXT_TEMPERATURE: f64 = 0.7;

/// Default temperature for rich persona content
pub const PERSONA_TEMPERATURE: f64 = 0.8;

/// Default temperature for grounded Q&A
pub const GROUNDED_TEMPERATURE: f64 = 0.5;

/// Request JSON-only output and parse the reply into structured data
///
/// # Errors
///
/// Returns `Error::Extraction` if the reply contains no complete
/// bracketed span, `Error::Parse` if the span is not valid JSON, or
/// any gateway error.
pub async fn extract_structured(
    client: &InferenceClient,
    model: &str,
    task: &str,
    temperature: Option<f64>,
) -> Result<Value> {
    let prompt = compose_structured(task);
    let raw = client
        .generate_once(
            model,
            &prompt,
            temperature.unwrap_or(STRUCTURED_TEMPERATURE),
            Some("json"),
        )
        .await?;

    parse_structured(&raw)
}

/// Request a short constrained reply, returned trimmed
///
/// # Errors
///
/// Returns any gateway error.
pub async fn short_text(
    client: &InferenceClient,
    model: &str,
    instruction: &str,
    temperature: Option<f64>,
) -> Result<String> {
    let prompt = compose_short_text(instruction);
    let raw = client
        .generate_once(
            model,
            &prompt,
            temperature.unwrap_or(SHORT_TEXT_TEMPERATURE),
            None,
        )
        .await?;

    Ok(raw.trim().to_string())
}

/// Request longer-form content in a persona's voice, returned raw
///
/// # Errors
///
/// Returns any gateway error.
pub async fn persona_content(
    client: &InferenceClient,
    model: &str,
    persona: &str,
    format: &str,
    sections: Option<&[&str]>,
    temperature: Option<f64>,
) -> Result<String> {
    let prompt = compose_persona(persona, format, sections);
    client
        .generate_once(
            model,
            &prompt,
            temperature.unwrap_or(PERSONA_TEMPERATURE),
            None,
        )
        .await
}

/// Answer a question using only the supplied context, returned trimmed
///
/// # Errors
///
/// Returns any gateway error.
pub async fn grounded_answer(
    client: &InferenceClient,
    model: &str,
    context: &str,
    question: &str,
    temperature: Option<f64>,
) -> Result<String> {
    let prompt = compose_grounded(context, question);
    let raw = client
        .generate_once(
            model,
            &prompt,
            temperature.unwrap_or(GROUNDED_TEMPERATURE),
            None,
        )
        .await?;

    Ok(raw.trim().to_string())
}

fn compose_structured(task: &str) -> String {
    format!("Respond with JSON only. No prose, no explanations, no code fences.\n\n{task}")
}

fn compose_short_text(instruction: &str) -> String {
    format!("Reply with only the requested text and nothing else.\n\n{instruction}")
}

fn compose_persona(persona: &str, format: &str, sections: Option<&[&str]>) -> String {
    let mut prompt = format!("You are {persona}.\n\nWrite {format}.");

    if let Some(sections) = sections.filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nInclude these sections, in this order:\n");
        for (i, section) in sections.iter().enumerate() {
            prompt.push_str(&format!("{}. {section}\n", i + 1));
        }
    }

    prompt
}

fn compose_grounded(context: &str, question: &str) -> String {
    format!(
        "Context:\n{context}\n\nUsing only the context above, and no outside \
knowledge, answer the following question. If the context does not contain \
the answer, say so.\n\nQuestion: {question}"
    )
}

/// Parse the first complete JSON span out of a raw model reply
///
/// # Errors
///
/// Returns `Error::Extraction` if no complete span is present, or
/// `Error::Parse` if the span is not valid JSON.
pub fn parse_structured(raw: &str) -> Result<Value> {
    let span = extract_json_span(raw)?;
    serde_json::from_str(span).map_err(|e| Error::Parse(format!("invalid JSON span: {e}")))
}

/// Locate the first top-level JSON object or array in the text
///
/// Whichever opening bracket appears first selects object or array
/// mode; the span closes at the last occurrence of the complementary
/// bracket, scanning from the end.
fn extract_json_span(text: &str) -> Result<&str> {
    let object_start = text.find('{');
    let array_start = text.find('[');

    let (start, closer) = match (object_start, array_start) {
        (Some(o), Some(a)) if o < a => (o, '}'),
        (Some(o), None) => (o, '}'),
        (_, Some(a)) => (a, ']'),
        (None, None) => {
            return Err(Error::Extraction("no opening bracket in reply".to_string()));
        }
    };

    let end = text
        .rfind(closer)
        .filter(|&end| end > start)
        .ok_or_else(|| Error::Extraction(format!("no closing {closer:?} after span start")))?;

    Ok(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_embedded_in_prose() {
        let value = parse_structured(r#"Here: {"a":1,"b":[2,3]} thanks"#).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"][1], 3);
    }

    #[test]
    fn extracts_array_embedded_in_prose() {
        let value = parse_structured("sure thing: [1, 2, 3] hope that helps").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn no_brackets_is_extraction_error() {
        let err = parse_structured("no structured data here").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn mismatched_brackets_is_extraction_error() {
        let err = parse_structured("[1,2} broken").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn invalid_span_is_parse_error() {
        let err = parse_structured("{not: valid json}").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn object_mode_wins_when_object_opens_first() {
        let value = parse_structured(r#"{"items":[1,2]}"#).unwrap();
        assert!(value.is_object());
    }

    #[test]
    fn array_mode_wins_when_array_opens_first() {
        let value = parse_structured(r#"[{"a":1}]"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn persona_prompt_folds_ordered_sections() {
        let prompt = compose_persona(
            "a pirate captain",
            "a short shanty",
            Some(&["the storm", "the treasure"]),
        );
        assert!(prompt.contains("You are a pirate captain."));
        assert!(prompt.contains("1. the storm"));
        assert!(prompt.contains("2. the treasure"));
    }

    #[test]
    fn persona_prompt_omits_section_list_when_absent() {
        let prompt = compose_persona("a poet", "a haiku", None);
        assert!(!prompt.contains("sections"));
    }

    #[test]
    fn grounded_prompt_places_context_before_question() {
        let prompt = compose_grounded("the sky is green", "what color is the sky?");
        let context_pos = prompt.find("the sky is green").unwrap();
        let question_pos = prompt.find("what color").unwrap();
        assert!(context_pos < question_pos);
        assert!(prompt.contains("only the context above"));
    }
}
