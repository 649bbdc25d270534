//! Jira markup cleanup.
//!
//! Converts Jira wiki markup into markdown that reads well inside a prompt.
//! Conversion is best-effort: anything that is not recognized is passed
//! through verbatim, and no input can make it fail.
//!
//! | Jira                       | Markdown              |
//! |----------------------------|-----------------------|
//! | `h2. Title`                | `## Title`            |
//! | `*bold*` / `_italic_`      | `**bold**` / `*italic*` |
//! | `{{mono}}`                 | `` `mono` ``          |
//! | `[text\|url]`              | `[text](url)`         |
//! | `{code:rust}...{code}`     | fenced block          |
//! | `* item` / `# item`        | `- item` / `1. item`  |

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("markup pattern is valid")
}

static PREFORMATTED: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?s)\{code(?::([^}]*))?\}(.*?)\{code\}|\{noformat(?::[^}]*)?\}(.*?)\{noformat\}")
});
static QUOTE_BLOCK: LazyLock<Regex> = LazyLock::new(|| regex(r"(?s)\{quote\}(.*?)\{quote\}"));
static WRAPPER_MACRO: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\{(?:color|panel)(?::[^}]*)?\}"));

static HEADING: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*h([1-6])\.\s+(.*)$"));
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*bq\.\s+(.*)$"));
static RULE: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*-{4,}\s*$"));
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*([*#]+)\s+(.*)$"));

static MENTION_ACCOUNT: LazyLock<Regex> = LazyLock::new(|| regex(r"\[~accountid:([^\]]+)\]"));
static MENTION: LazyLock<Regex> = LazyLock::new(|| regex(r"\[~([^\]]+)\]"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"!([^!\s|]+\.[A-Za-z0-9]+)(?:\|[^!\n]*)?!"));
static LABELED_LINK: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\[([^\[\]|\n]+)\|([^\[\]\n]+)\]"));
static BARE_LINK: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\[((?:https?://|ftp://|mailto:)[^\]\s]+)\]"));
static MONOSPACE: LazyLock<Regex> = LazyLock::new(|| regex(r"\{\{(.+?)\}\}"));
// Code spans and URLs, which emphasis must not reach into
static VERBATIM: LazyLock<Regex> =
    LazyLock::new(|| regex(r"`[^`\n]*`|(?:https?|ftp)://[^\s<>`*]+|mailto:[^\s<>`*]+"));

static BOLD: LazyLock<Regex> = LazyLock::new(|| regex(r"\*([^\s*](?:[^*\n]*?[^\s*])?)\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| regex(r"_([^\s_](?:[^_\n]*?[^\s_])?)_"));
static STRIKE: LazyLock<Regex> = LazyLock::new(|| regex(r"-([^\s-](?:[^-\n]*?[^\s-])?)-"));
static INSERTED: LazyLock<Regex> = LazyLock::new(|| regex(r"\+([^\s+](?:[^+\n]*?[^\s+])?)\+"));

/// Clean optional Jira markup. `None` stays `None`.
pub fn clean(text: Option<&str>) -> Option<String> {
    text.map(jira_to_markdown)
}

/// Clean a raw field value.
///
/// Strings are treated as wiki markup, ADF documents are flattened to text,
/// and every other value is returned unchanged.
pub fn clean_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(jira_to_markdown(text)),
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("doc") => {
            Value::String(adf_to_text(value))
        }
        other => other.clone(),
    }
}

/// Convert Jira wiki markup to markdown.
pub fn jira_to_markdown(input: &str) -> String {
    let text = input.replace("\r\n", "\n");
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    // Preformatted blocks are copied without touching their bodies
    for caps in PREFORMATTED.captures_iter(&text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        output.push_str(&convert_segment(&text[last..whole.start()]));

        let (language, body) = match caps.get(2) {
            Some(body) => (code_language(caps.get(1).map_or("", |m| m.as_str())), body),
            None => match caps.get(3) {
                Some(body) => ("", body),
                None => continue,
            },
        };
        output.push_str("```");
        output.push_str(language);
        output.push('\n');
        output.push_str(body.as_str().trim_matches('\n'));
        output.push_str("\n```");

        last = whole.end();
    }

    output.push_str(&convert_segment(&text[last..]));
    output
}

/// Language of a `{code:...}` macro; parameters like `title=x` are ignored.
fn code_language(params: &str) -> &str {
    params
        .split('|')
        .next()
        .filter(|p| !p.contains('='))
        .map(str::trim)
        .unwrap_or("")
}

fn convert_segment(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }

    let segment = QUOTE_BLOCK.replace_all(segment, |caps: &Captures| {
        caps.get(1)
            .map_or("", |m| m.as_str())
            .trim_matches('\n')
            .split('\n')
            .map(|line| format!("> {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    });
    let segment = WRAPPER_MACRO.replace_all(&segment, "");

    segment
        .split('\n')
        .map(convert_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn convert_line(line: &str) -> String {
    if let Some(caps) = HEADING.captures(line) {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        return format!("{} {}", "#".repeat(level), convert_inline(&caps[2]));
    }

    if let Some(caps) = BLOCKQUOTE.captures(line) {
        return format!("> {}", convert_inline(&caps[1]));
    }

    if RULE.is_match(line) {
        return "---".to_string();
    }

    if let Some(caps) = LIST_ITEM.captures(line) {
        let markers = &caps[1];
        let indent = "  ".repeat(markers.len() - 1);
        let bullet = if markers.ends_with('#') { "1." } else { "-" };
        return format!("{}{} {}", indent, bullet, convert_inline(&caps[2]));
    }

    let trimmed = line.trim();
    if trimmed.len() > 2 && trimmed.starts_with("||") && trimmed.ends_with("||") {
        let converted = convert_inline(trimmed);
        let inner = converted
            .trim_start_matches("||")
            .trim_end_matches("||");
        let cells: Vec<&str> = inner.split("||").map(str::trim).collect();
        let separator = vec!["---"; cells.len()];
        return format!("| {} |\n| {} |", cells.join(" | "), separator.join(" | "));
    }

    if trimmed.len() > 1 && trimmed.starts_with('|') && trimmed.ends_with('|') {
        let converted = convert_inline(trimmed);
        let inner = converted
            .strip_prefix('|')
            .and_then(|s| s.strip_suffix('|'))
            .unwrap_or(&converted);
        let cells: Vec<&str> = inner.split('|').map(str::trim).collect();
        return format!("| {} |", cells.join(" | "));
    }

    convert_inline(line)
}

fn convert_inline(text: &str) -> String {
    let text = MENTION_ACCOUNT.replace_all(text, "@$1");
    let text = MENTION.replace_all(&text, "@$1");
    let text = IMAGE.replace_all(&text, "![]($1)");
    let text = LABELED_LINK.replace_all(&text, "[$1]($2)");
    let text = BARE_LINK.replace_all(&text, "<$1>");
    let text = MONOSPACE.replace_all(&text, "`$1`");

    let text = replace_delimited(&text, &BOLD, '*', "**");
    let text = replace_delimited(&text, &ITALIC, '_', "*");
    let text = replace_delimited(&text, &STRIKE, '-', "~~");
    replace_delimited(&text, &INSERTED, '+', "")
}

/// Replace `<delim>text<delim>` spans that stand on word boundaries, so
/// `snake_case` or `2024-01-02` are left alone. A delimiter inside a code
/// span or URL never opens or closes a span.
fn replace_delimited(text: &str, pattern: &Regex, delimiter: char, marker: &str) -> String {
    let is_boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric() && c != delimiter);
    let verbatim: Vec<_> = VERBATIM.find_iter(text).map(|m| m.range()).collect();
    let in_verbatim = |at: usize| verbatim.iter().any(|range| range.contains(&at));

    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if !is_boundary(before) || !is_boundary(after) {
            continue;
        }
        if in_verbatim(whole.start()) || in_verbatim(whole.end() - 1) {
            continue;
        }

        output.push_str(&text[last..whole.start()]);
        output.push_str(marker);
        output.push_str(inner.as_str());
        output.push_str(marker);
        last = whole.end();
    }

    output.push_str(&text[last..]);
    output
}

/// Extract plain text from an ADF document (Jira Cloud API v3 bodies).
///
/// Recursively walks the ADF tree extracting text nodes.
/// Falls back to returning the value as a string if it's not an ADF document.
pub fn adf_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            let node_type = obj.get("type").and_then(Value::as_str);

            match node_type {
                Some("text") => {
                    return obj
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                }
                Some("hardBreak") => return "\n".to_string(),
                Some("mention") => {
                    return obj
                        .get("attrs")
                        .and_then(|a| a.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                }
                _ => {}
            }

            let Some(content) = obj.get("content").and_then(Value::as_array) else {
                return String::new();
            };

            match node_type {
                // Block containers separate their children with blank lines
                Some("doc") | Some("blockquote") | Some("panel") => content
                    .iter()
                    .map(adf_to_text)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                Some("bulletList") | Some("orderedList") => content
                    .iter()
                    .map(|item| format!("- {}", adf_to_text(item)))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Some("codeBlock") => {
                    let body: String = content.iter().map(adf_to_text).collect();
                    format!("```\n{}\n```", body)
                }
                _ => content.iter().map(adf_to_text).collect(),
            }
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn md(text: &str) -> String {
        jira_to_markdown(text)
    }

    #[test]
    fn test_clean_none() {
        assert_eq!(clean(None), None);
        assert_eq!(clean(Some("")), Some(String::new()));
    }

    #[test]
    fn test_headings() {
        assert_eq!(md("h1. Title\nh3. Sub"), "# Title\n### Sub");
    }

    #[test]
    fn test_emphasis() {
        assert_eq!(
            md("This is *bold* and _italic_ text"),
            "This is **bold** and *italic* text"
        );
        assert_eq!(md("*a* *b*"), "**a** **b**");
        assert_eq!(md("-gone- and +added+"), "~~gone~~ and added");
    }

    #[test]
    fn test_word_internal_delimiters_untouched() {
        assert_eq!(md("well-known 2024-01-02"), "well-known 2024-01-02");
        assert_eq!(md("use snake_case_names"), "use snake_case_names");
        assert_eq!(md("2*3*4 and C++"), "2*3*4 and C++");
    }

    #[test]
    fn test_emphasis_skips_code_and_urls() {
        assert_eq!(md("Call {{_private_}} first"), "Call `_private_` first");
        assert_eq!(md("See https://x.io/_a_/ now"), "See https://x.io/_a_/ now");
        assert_eq!(
            md("[guide|https://wiki.io/-draft-/page] is _new_"),
            "[guide](https://wiki.io/-draft-/page) is *new*"
        );
        assert_eq!(
            md("*run {{make}}* then *see https://x.io*"),
            "**run `make`** then **see https://x.io**"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            md("* one\n** nested\n# first\n## second"),
            "- one\n  - nested\n1. first\n  1. second"
        );
    }

    #[test]
    fn test_code_block_body_untouched() {
        assert_eq!(
            md("Before\n{code:java}\nint x = *y*;\n{code}\nAfter"),
            "Before\n```java\nint x = *y*;\n```\nAfter"
        );
        assert_eq!(
            md("{code:title=Main.java|borderStyle=solid}\nmain()\n{code}"),
            "```\nmain()\n```"
        );
    }

    #[test]
    fn test_noformat() {
        assert_eq!(md("{noformat}raw _text_{noformat}"), "```\nraw _text_\n```");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            md("See [docs|https://example.com/a_b_c] and [https://x.io]"),
            "See [docs](https://example.com/a_b_c) and <https://x.io>"
        );
    }

    #[test]
    fn test_mentions() {
        assert_eq!(
            md("Thanks [~jdoe] and [~accountid:5b10ac]"),
            "Thanks @jdoe and @5b10ac"
        );
    }

    #[test]
    fn test_tables() {
        assert_eq!(
            md("||Name||Status||\n|Login|Open|"),
            "| Name | Status |\n| --- | --- |\n| Login | Open |"
        );
    }

    #[test]
    fn test_monospace_and_images() {
        assert_eq!(md("Run {{cargo test}} now"), "Run `cargo test` now");
        assert_eq!(md("!screenshot.png|thumbnail!"), "![](screenshot.png)");
        assert_eq!(md("Hello! World!"), "Hello! World!");
    }

    #[test]
    fn test_quotes_and_wrappers() {
        assert_eq!(md("{quote}first\nsecond{quote}"), "> first\n> second");
        assert_eq!(md("bq. quoted"), "> quoted");
        assert_eq!(md("{color:red}alert{color} level"), "alert level");
        assert_eq!(md("----"), "---");
    }

    #[test]
    fn test_crlf_normalized() {
        assert_eq!(md("h2. A\r\nbody"), "## A\nbody");
    }

    #[test]
    fn test_malformed_markup_degrades() {
        assert_eq!(
            md("{code}never closed *bold*"),
            "{code}never closed **bold**"
        );
        assert_eq!(md("{unknown:macro}text"), "{unknown:macro}text");

        for garbage in ["[|]{{*_-+!", "{{", "}}", "*", "h1.", "||", "|", "[~]", "ü*ö*ä"] {
            // Must not panic
            let _ = md(garbage);
        }
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value(&json!(null)), json!(null));
        assert_eq!(clean_value(&json!("h1. T")), json!("# T"));
        assert_eq!(clean_value(&json!(42)), json!(42));

        let adf = json!({
            "version": 1,
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "First"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Line"},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "break"}
                ]}
            ]
        });
        assert_eq!(clean_value(&adf), json!("First\n\nLine\nbreak"));
    }

    #[test]
    fn test_adf_lists_and_mentions() {
        let adf = json!({
            "type": "doc",
            "content": [{
                "type": "bulletList",
                "content": [
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "one"}]}
                    ]},
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [
                            {"type": "mention", "attrs": {"text": "@Jane"}}
                        ]}
                    ]}
                ]
            }]
        });
        assert_eq!(adf_to_text(&adf), "- one\n- @Jane");
    }
}
