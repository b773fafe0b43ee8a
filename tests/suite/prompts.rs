//! Prompt file parsing

use fanout::parse_prompts;

#[test]
fn one_prompt_per_non_blank_line() {
    let input = "Summarize this.\n\n\tTranslate that.\t\n   \nLast one";
    let prompts = parse_prompts(input);

    let texts: Vec<&str> = prompts.iter().map(|p| p.as_str()).collect();
    assert_eq!(texts, ["Summarize this.", "Translate that.", "Last one"]);
}

#[test]
fn blank_input_has_no_prompts() {
    assert!(parse_prompts("").is_empty());
    assert!(parse_prompts("\n\r\n   \n").is_empty());
}

#[test]
fn windows_line_endings_are_trimmed() {
    let prompts = parse_prompts("a\r\nb\r\n");
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1].as_str(), "b");
}
