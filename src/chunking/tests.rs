use super::*;

fn config(max_chunk_chars: usize) -> ChunkingConfig {
    ChunkingConfig { max_chunk_chars }
}

#[test]
fn clean_text_normalizes_line_endings() {
    assert_eq!(clean_text("a\r\nb"), "a\n\nb");
    assert_eq!(clean_text("a\rb"), "a\nb");
}

#[test]
fn clean_text_collapses_newline_runs() {
    assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
    assert_eq!(clean_text("a\n\nb"), "a\n\nb");
    assert_eq!(clean_text("a\nb"), "a\nb");
}

#[test]
fn clean_text_trims_surrounding_whitespace() {
    assert_eq!(clean_text("  \n hello \n  "), "hello");
}

#[test]
fn short_text_is_single_chunk() {
    let chunks = split_chunks("one paragraph only", &config(900));
    assert_eq!(chunks, vec!["one paragraph only"]);
}

#[test]
fn paragraphs_pack_until_budget() {
    let text = format!("{}\n\n{}\n\n{}", "a".repeat(400), "b".repeat(400), "c".repeat(400));
    let chunks = split_chunks(&text, &config(900));

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].contains(&"a".repeat(400)));
    assert!(chunks[0].contains(&"b".repeat(400)));
    assert!(chunks[1].contains(&"c".repeat(400)));
}

#[test]
fn oversized_paragraph_becomes_own_chunk() {
    let big = "x".repeat(2000);
    let text = format!("small\n\n{big}");
    let chunks = split_chunks(&text, &config(900));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], "small");
    assert_eq!(chunks[1], big);
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(split_chunks("", &config(900)).is_empty());
}

#[test]
fn chunk_boundaries_preserve_paragraph_content() {
    let text = "first paragraph\n\nsecond paragraph";
    let chunks = split_chunks(text, &config(900));
    assert_eq!(chunks, vec!["first paragraph\n\nsecond paragraph"]);
}
