use super::*;
use crate::config::OpenAiConfig;

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        chat_model: "test-chat".to_string(),
        embedding_model: "test-embed".to_string(),
        embedding_batch_size: 16,
    }
}

fn sample_task() -> ExtractedTask {
    ExtractedTask {
        title: "Close the month".to_string(),
        summary: "Monthly closing checklist".to_string(),
        steps: vec![
            TaskStep {
                step: 1,
                description: "Reconcile invoices".to_string(),
            },
            TaskStep {
                step: 2,
                description: "Submit the report".to_string(),
            },
        ],
        key_points: vec!["Deadline is the 5th".to_string()],
    }
}

#[test]
fn parse_label_accepts_known_categories() {
    assert_eq!(Category::parse_label("PROCEDURE"), Category::Procedure);
    assert_eq!(Category::parse_label("rule"), Category::Rule);
    assert_eq!(Category::parse_label("  Responsibility \n"), Category::Responsibility);
    assert_eq!(Category::parse_label("REFERENCE"), Category::Reference);
    assert_eq!(Category::parse_label("COMMUNICATION"), Category::Communication);
}

#[test]
fn parse_label_defaults_to_communication() {
    assert_eq!(Category::parse_label("GIBBERISH"), Category::Communication);
    assert_eq!(Category::parse_label(""), Category::Communication);
}

#[test]
fn task_formatting_orders_blocks() {
    let extraction = Extraction::Tasks(vec![sample_task()]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Close the month");
    assert_eq!(
        notes[0].manual,
        "[Summary]\nMonthly closing checklist\n\n\
         [Steps]\n1. Reconcile invoices\n2. Submit the report\n\n\
         [Key points]\n- Deadline is the 5th"
    );
}

#[test]
fn task_formatting_omits_absent_blocks() {
    let extraction = Extraction::Tasks(vec![ExtractedTask {
        title: "Quick note".to_string(),
        summary: String::new(),
        steps: Vec::new(),
        key_points: vec!["Check the portal first".to_string()],
    }]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes[0].manual, "[Key points]\n- Check the portal first");
}

#[test]
fn empty_task_gets_placeholders() {
    let extraction = Extraction::Tasks(vec![ExtractedTask {
        title: String::new(),
        summary: String::new(),
        steps: Vec::new(),
        key_points: Vec::new(),
    }]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes[0].title, "Untitled");
    assert_eq!(notes[0].manual, "No content");
}

#[test]
fn rule_formatting() {
    let extraction = Extraction::Rules(vec![
        ExtractedRule {
            title: "Cutoff".to_string(),
            rule_text: "Orders after 3pm ship next day".to_string(),
        },
        ExtractedRule {
            title: String::new(),
            rule_text: "Always CC the team alias".to_string(),
        },
    ]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes[0].title, "Cutoff");
    assert_eq!(notes[0].manual, "[Rule]\nOrders after 3pm ship next day");
    assert_eq!(notes[1].title, "Rule");
}

#[test]
fn person_formatting_includes_email_when_present() {
    let extraction = Extraction::People(vec![ExtractedPerson {
        name: "Kim".to_string(),
        role: "Ops lead".to_string(),
        responsibility: "Carrier escalations".to_string(),
        email: Some("kim@example.com".to_string()),
    }]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes[0].title, "Kim (Ops lead)");
    assert_eq!(
        notes[0].manual,
        "[Responsibilities]\nCarrier escalations\nEmail: kim@example.com"
    );
}

#[test]
fn references_collapse_into_one_note() {
    let extraction = Extraction::References(vec![
        "https://portal.example.com".to_string(),
        "code XJ-42".to_string(),
    ]);
    let notes = format_extraction(&extraction);

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Reference material");
    assert_eq!(notes[0].manual, "- https://portal.example.com\n- code XJ-42");
}

#[test]
fn empty_extraction_yields_zero_pairs() {
    assert!(format_extraction(&Extraction::Tasks(Vec::new())).is_empty());
    assert!(format_extraction(&Extraction::Rules(Vec::new())).is_empty());
    assert!(format_extraction(&Extraction::People(Vec::new())).is_empty());
    assert!(format_extraction(&Extraction::References(Vec::new())).is_empty());
}

#[test]
fn formatting_is_deterministic() {
    let extraction = Extraction::Tasks(vec![sample_task()]);
    let first = format_extraction(&extraction);
    let second = format_extraction(&extraction);
    assert_eq!(first, second);
}

#[tokio::test]
async fn classifier_failure_skips_the_line() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/v1", server.uri()));
    let client = OpenAiClient::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1);

    let notes = tokio::task::spawn_blocking(move || structure_text(&client, "매뉴얼 없음"))
        .await
        .expect("task panicked")
        .expect("Failed to structure text");

    assert!(notes.is_empty());
}

#[tokio::test]
async fn communication_lines_are_dropped() {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    // The classifier verdict short-circuits, so no extractor request may arrive.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "COMMUNICATION"}}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/v1", server.uri()));
    let client = OpenAiClient::new(&config).expect("Failed to create client");

    let notes = tokio::task::spawn_blocking(move || {
        structure_text(&client, "Hello everyone!\n\nHave a great weekend")
    })
    .await
    .expect("task panicked")
    .expect("Failed to structure text");

    assert!(notes.is_empty());
}

#[tokio::test]
async fn procedure_line_is_extracted_and_formatted() {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    // The extractor request carries json_mode; the classifier does not.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"tasks\": [{\"title\": \"File the claim\", \"summary\": \"Damage claims\", \"steps\": [{\"step\": 1, \"description\": \"Photograph the cargo\"}], \"key_points\": []}]}"
            }}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"max_tokens": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "PROCEDURE"}}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/v1", server.uri()));
    let client = OpenAiClient::new(&config).expect("Failed to create client");

    let notes = tokio::task::spawn_blocking(move || {
        structure_text(&client, "When cargo arrives damaged, photograph it and file a claim")
    })
    .await
    .expect("task panicked")
    .expect("Failed to structure text");

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "File the claim");
    assert!(notes[0].manual.starts_with("[Summary]\nDamage claims"));
    assert!(notes[0].manual.contains("[Steps]\n1. Photograph the cargo"));
}

#[tokio::test]
async fn unparseable_extraction_yields_zero_notes() {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "not json at all"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"max_tokens": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "RULE"}}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/v1", server.uri()));
    let client = OpenAiClient::new(&config).expect("Failed to create client");

    let notes = tokio::task::spawn_blocking(move || {
        structure_text(&client, "Invoices must be approved before Friday")
    })
    .await
    .expect("task panicked")
    .expect("Failed to structure text");

    assert!(notes.is_empty());
}
