#[cfg(test)]
mod tests;

// Structure pipeline: classify each line of pasted text, extract typed
// content from the work-relevant lines, and format the extractions into
// (title, manual) pairs ready for ingestion.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{ChatMessage, ChatOptions, OpenAiClient};

/// One normalized note produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredNote {
    pub title: String,
    pub manual: String,
}

/// Line-level category. COMMUNICATION lines carry no work knowledge and
/// are dropped before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Procedure,
    Rule,
    Responsibility,
    Reference,
    Communication,
}

impl Category {
    /// Parse a classifier reply. Anything that is not one of the five
    /// known labels falls back to COMMUNICATION.
    #[inline]
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "PROCEDURE" => Self::Procedure,
            "RULE" => Self::Rule,
            "RESPONSIBILITY" => Self::Responsibility,
            "REFERENCE" => Self::Reference,
            _ => Self::Communication,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStep {
    pub step: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedRule {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rule_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedPerson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub responsibility: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Typed extraction result for one line. A failed call or unparseable
/// reply degrades to an empty variant rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Tasks(Vec<ExtractedTask>),
    Rules(Vec<ExtractedRule>),
    People(Vec<ExtractedPerson>),
    References(Vec<String>),
}

impl Extraction {
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tasks(tasks) => tasks.is_empty(),
            Self::Rules(rules) => rules.is_empty(),
            Self::People(people) => people.is_empty(),
            Self::References(references) => references.is_empty(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TaskExtraction {
    #[serde(default)]
    tasks: Vec<ExtractedTask>,
}

#[derive(Debug, Default, Deserialize)]
struct RuleExtraction {
    #[serde(default)]
    rules: Vec<ExtractedRule>,
}

#[derive(Debug, Default, Deserialize)]
struct PersonExtraction {
    #[serde(default)]
    people: Vec<ExtractedPerson>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferenceExtraction {
    #[serde(default)]
    references: Vec<String>,
}

const CLASSIFY_PROMPT: &str = "\
You are an expert at organizing workplace handover notes.
Read the given sentence and pick the single best-fitting category below.

[Category definitions]
1. PROCEDURE: steps, ordering, how-to, know-how, system operation, or any description of how work is done.
2. RULE: criteria, conditions, deadlines, or principles; regulation-centric sentences rather than procedures.
3. RESPONSIBILITY: people, departments, owners, or role information.
4. REFERENCE: links, emails, codes, numbers, or other plain reference material.
5. COMMUNICATION: greetings, personal remarks, schedule chatter, emotional expressions.

Caution:
- Even a short sentence must be PROCEDURE or RULE if it carries a work rule, system, or manual-like information.
- Do not classify as COMMUNICATION merely because the sentence is short or has no steps.

[Sentence to classify]
";

const PROCEDURE_PROMPT: &str = "\
You are an expert at writing operational work manuals.
Find the work procedures or methods in the text below and organize them as JSON.

[Output format]
{
  \"tasks\": [
    {
      \"title\": \"task name\",
      \"summary\": \"short summary\",
      \"steps\": [
        { \"step\": 1, \"description\": \"step-by-step instruction\" }
      ],
      \"key_points\": [\"cautions\", \"tips\"]
    }
  ]
}";

const RULE_PROMPT: &str = "\
Find the rule-like sentences in the text below (policies, criteria, conditions, deadlines) and summarize them.
[Output format]
{
  \"rules\": [
    { \"title\": \"rule title\", \"rule_text\": \"rule details\" }
  ]
}";

const RESPONSIBILITY_PROMPT: &str = "\
Extract people, roles, responsibilities, and email addresses from the text below, organized like an org chart.
[Output format]
{
  \"people\": [
    { \"name\": \"full name\", \"role\": \"job title\", \"responsibility\": \"duties\", \"email\": \"email address (if any)\" }
  ]
}";

const REFERENCE_PROMPT: &str = "\
Extract every piece of reference information from the text below: URLs, emails, codes, numbers.
[Output format]
{ \"references\": [\"item 1\", \"item 2\", \"item 3\"] }";

/// Classify one line into a category. A failed call or an unknown label
/// both resolve to COMMUNICATION so the batch keeps moving.
#[inline]
pub fn classify(client: &OpenAiClient, line: &str) -> Category {
    let prompt = format!(
        "{CLASSIFY_PROMPT}{line}\n\n[Output]\nReturn exactly one of the five labels in uppercase (e.g. PROCEDURE)"
    );
    let options = ChatOptions {
        temperature: Some(0.0),
        max_tokens: Some(10),
        json_mode: false,
    };

    match client.chat_completion(&[ChatMessage::user(prompt)], &options) {
        Ok(label) => Category::parse_label(&label),
        Err(error) => {
            warn!("Classifier call failed, treating line as communication: {error:#}");
            Category::Communication
        }
    }
}

/// Run the category-specific JSON extraction for one line. Call or parse
/// failures degrade to an empty extraction.
#[inline]
pub fn extract(client: &OpenAiClient, category: Category, line: &str) -> Extraction {
    let prompt = match category {
        Category::Procedure => PROCEDURE_PROMPT,
        Category::Rule => RULE_PROMPT,
        Category::Responsibility => RESPONSIBILITY_PROMPT,
        Category::Reference => REFERENCE_PROMPT,
        Category::Communication => return Extraction::Tasks(Vec::new()),
    };

    let messages = [
        ChatMessage::system("You are a JSON extractor."),
        ChatMessage::user(format!("{prompt}\n\n[Text]\n{line}")),
    ];
    let options = ChatOptions {
        temperature: None,
        max_tokens: None,
        json_mode: true,
    };

    let reply = match client.chat_completion(&messages, &options) {
        Ok(reply) => reply,
        Err(error) => {
            warn!("Extractor call failed ({category:?}): {error:#}");
            String::from("{}")
        }
    };

    match category {
        Category::Procedure => {
            let parsed: TaskExtraction = parse_or_empty(&reply, category);
            Extraction::Tasks(parsed.tasks)
        }
        Category::Rule => {
            let parsed: RuleExtraction = parse_or_empty(&reply, category);
            Extraction::Rules(parsed.rules)
        }
        Category::Responsibility => {
            let parsed: PersonExtraction = parse_or_empty(&reply, category);
            Extraction::People(parsed.people)
        }
        Category::Reference => {
            let parsed: ReferenceExtraction = parse_or_empty(&reply, category);
            Extraction::References(parsed.references)
        }
        Category::Communication => Extraction::Tasks(Vec::new()),
    }
}

fn parse_or_empty<T: Default + for<'de> Deserialize<'de>>(reply: &str, category: Category) -> T {
    match serde_json::from_str(reply) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!("Failed to parse extraction reply ({category:?}): {error}");
            T::default()
        }
    }
}

/// Format an extraction into (title, manual) pairs. Pure and
/// deterministic; an empty extraction yields zero pairs.
#[inline]
pub fn format_extraction(extraction: &Extraction) -> Vec<StructuredNote> {
    let mut results = Vec::new();

    match extraction {
        Extraction::Tasks(tasks) => {
            for task in tasks {
                let mut text = String::new();
                if !task.summary.is_empty() {
                    text.push_str(&format!("[Summary]\n{}\n\n", task.summary));
                }
                if !task.steps.is_empty() {
                    let lines: Vec<String> = task
                        .steps
                        .iter()
                        .map(|s| format!("{}. {}", s.step, s.description))
                        .collect();
                    text.push_str(&format!("[Steps]\n{}\n\n", lines.join("\n")));
                }
                if !task.key_points.is_empty() {
                    let lines: Vec<String> =
                        task.key_points.iter().map(|point| format!("- {point}")).collect();
                    text.push_str(&format!("[Key points]\n{}", lines.join("\n")));
                }

                let manual = text.trim().to_string();
                results.push(StructuredNote {
                    title: if task.title.is_empty() {
                        "Untitled".to_string()
                    } else {
                        task.title.clone()
                    },
                    manual: if manual.is_empty() { "No content".to_string() } else { manual },
                });
            }
        }
        Extraction::Rules(rules) => {
            for rule in rules {
                results.push(StructuredNote {
                    title: if rule.title.is_empty() {
                        "Rule".to_string()
                    } else {
                        rule.title.clone()
                    },
                    manual: format!("[Rule]\n{}", rule.rule_text),
                });
            }
        }
        Extraction::People(people) => {
            for person in people {
                let mut manual = format!("[Responsibilities]\n{}", person.responsibility);
                if let Some(email) = &person.email {
                    manual.push_str(&format!("\nEmail: {email}"));
                }
                results.push(StructuredNote {
                    title: format!("{} ({})", person.name, person.role),
                    manual,
                });
            }
        }
        Extraction::References(references) => {
            if !references.is_empty() {
                let lines: Vec<String> =
                    references.iter().map(|item| format!("- {item}")).collect();
                results.push(StructuredNote {
                    title: "Reference material".to_string(),
                    manual: lines.join("\n"),
                });
            }
        }
    }

    results
}

/// Run the full classify, extract, format pipeline over a pasted block of
/// text, one line at a time. Lines classified as COMMUNICATION are
/// skipped; per-line failures degrade to empty extractions.
#[inline]
pub fn structure_text(client: &OpenAiClient, raw_text: &str) -> Result<Vec<StructuredNote>> {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    debug!("Structuring {} non-empty lines", lines.len());

    let mut all_results = Vec::new();
    for line in lines {
        let category = classify(client, line);
        if category == Category::Communication {
            continue;
        }

        let extracted = extract(client, category, line);
        all_results.extend(format_extraction(&extracted));
    }

    debug!("Pipeline produced {} structured notes", all_results.len());
    Ok(all_results)
}
