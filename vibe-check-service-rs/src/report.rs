//! Generation stage: grounded summary and markdown report
//!
//! One completion combines the vision analysis with the retrieved passages.
//! The returned report is normalised so headings and paragraphs are always
//! separated, and rejected if a required section is missing.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::error::{Result, VibeCheckError};
use crate::json_repair::decode_llm_object;
use crate::models::{GeneratedReport, KnowledgeSet, VisionAnalysis};
use crate::providers::TextGenerator;

/// Sections every report must contain, in order
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "Emotional State Assessment",
    "Body Language Breakdown",
    "Behavioral Context",
    "Comfort & Well-being Level",
    "Scientific Backing",
    "Recommendations",
];

pub const MIN_SUMMARY_WORDS: usize = 5;
pub const MAX_SUMMARY_WORDS: usize = 15;

pub const SYSTEM_PROMPT: &str = "You are a warm, playful canine behavior expert writing for dog owners. \
Ground every claim in the analysis and reference passages you are given, and never invent sources. \
Always respond with a single JSON object and nothing else.";

static INLINE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S)[ \t]+(#{2,6}[ \t]+\S)").unwrap());
static HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}[ \t]+(.+?)[ \t#]*$").unwrap());
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

pub struct ReportGenerator {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl ReportGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn generate(&self, analysis: &VisionAnalysis, knowledge: &KnowledgeSet) -> Result<GeneratedReport> {
        let prompt = build_prompt(analysis, knowledge);

        let raw = match timeout(self.timeout, self.generator.generate(SYSTEM_PROMPT, &prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(VibeCheckError::report(format!("model call failed: {}", e))),
            Err(_) => {
                return Err(VibeCheckError::report(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        parse_report(&raw)
    }
}

/// User prompt: analysis, passages as one text block, then a numbered sources list
pub fn build_prompt(analysis: &VisionAnalysis, knowledge: &KnowledgeSet) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Vision analysis of the dog:");
    let _ = writeln!(prompt, "- Body language: {}", analysis.body_language);
    let _ = writeln!(prompt, "- Mood: {}", analysis.mood);
    let _ = writeln!(prompt, "- Behavior: {}", analysis.behavior);
    let _ = writeln!(prompt, "- Confidence: {:.2}", analysis.confidence);

    prompt.push_str("\nReference passages from the canine behavior knowledge base:\n");
    if knowledge.is_empty() {
        prompt.push_str("No reference passages were found.\n");
    } else {
        prompt.push_str(&knowledge.contents().join("\n\n"));
        prompt.push('\n');
    }

    prompt.push_str("\nSources:\n");
    let sources = knowledge.sources();
    if sources.is_empty() {
        prompt.push_str("No sources were found; do not cite any.\n");
    } else {
        for (i, source) in sources.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, source);
        }
    }

    prompt.push_str(
        "\nRespond with a JSON object with exactly two string fields:\n\
         \"short_summary\": one playful sentence of 5 to 15 words capturing the dog's vibe.\n\
         \"detailed_report\": a markdown report with these level-2 headings, in this order:\n",
    );
    for section in REQUIRED_SECTIONS {
        let _ = writeln!(prompt, "## {}", section);
    }
    prompt.push_str(
        "Put a blank line before and after every heading, keep each heading on its own line, \
         and never split a heading or paragraph across fields. Encode line breaks as \\n inside the JSON string.",
    );

    prompt
}

/// Decode, normalise and validate the model's report
pub fn parse_report(raw: &str) -> Result<GeneratedReport> {
    let object = decode_llm_object(raw)
        .map_err(|e| VibeCheckError::report(format!("unparsable report: {}", e)))?;

    let short_summary = normalize_summary(&required_text(&object, "short_summary")?)?;
    let detailed_report = normalize_markdown(&required_text(&object, "detailed_report")?);

    let missing = missing_sections(&detailed_report);
    if !missing.is_empty() {
        return Err(VibeCheckError::report(format!(
            "report is missing sections: {}",
            missing.join(", ")
        )));
    }

    Ok(GeneratedReport {
        short_summary,
        detailed_report,
    })
}

fn required_text(object: &Map<String, Value>, key: &str) -> Result<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| VibeCheckError::report(format!("report is missing \"{}\"", key)))
}

/// Collapse to one line and enforce the word-count bounds.
///
/// Summaries over the limit are cut to `MAX_SUMMARY_WORDS`; summaries under
/// `MIN_SUMMARY_WORDS` are rejected.
pub fn normalize_summary(summary: &str) -> Result<String> {
    let words: Vec<&str> = summary.split_whitespace().collect();

    if words.len() < MIN_SUMMARY_WORDS {
        return Err(VibeCheckError::report(format!(
            "short_summary has {} words, expected at least {}",
            words.len(),
            MIN_SUMMARY_WORDS
        )));
    }

    if words.len() > MAX_SUMMARY_WORDS {
        log::debug!("Truncating short_summary from {} words", words.len());
        let cut = words[..MAX_SUMMARY_WORDS].join(" ");
        return Ok(cut.trim_end_matches([',', ';', ':', '-']).trim_end().to_string());
    }

    Ok(words.join(" "))
}

/// Normalise model markdown: real newlines, headings on their own lines
/// surrounded by blank lines, no runs of blank lines
pub fn normalize_markdown(markdown: &str) -> String {
    let unescaped = markdown
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let split = INLINE_HEADING.replace_all(&unescaped, "$1\n\n$2");

    let mut lines: Vec<&str> = Vec::new();
    let mut after_heading = false;

    for line in split.lines().map(str::trim_end) {
        let is_heading = HEADING_LINE.is_match(line.trim_start());

        if is_heading || (after_heading && !line.is_empty()) {
            if lines.last().is_some_and(|prev| !prev.is_empty()) {
                lines.push("");
            }
        }

        lines.push(if is_heading { line.trim_start() } else { line });
        if !line.is_empty() {
            after_heading = is_heading;
        }
    }

    let joined = lines.join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Required sections with no matching heading
pub fn missing_sections(markdown: &str) -> Vec<&'static str> {
    let headings: Vec<String> = markdown
        .lines()
        .filter_map(|line| HEADING_LINE.captures(line.trim()))
        .filter_map(|caps| caps.get(1).map(|m| section_key(m.as_str())))
        .collect();

    REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|section| {
            let wanted = section_key(section);
            !headings.iter().any(|heading| heading.contains(&wanted))
        })
        .collect()
}

fn section_key(title: &str) -> String {
    title
        .to_lowercase()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
