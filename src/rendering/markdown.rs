use pulldown_cmark::{html, Options, Parser};

/// Render a document body to sanitized HTML.
///
/// Supports GitHub Flavored Markdown (GFM) features: tables,
/// footnotes, strikethrough, task lists, and smart punctuation.
/// Raw HTML and MDX component tags in the body pass through `ammonia`, so
/// scripts, event handlers and unknown elements never reach the page.
pub fn render_markdown(raw: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION;

    let parser = Parser::new_ext(raw, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    sanitize(&html_output)
}

fn sanitize(html: &str) -> String {
    ammonia::Builder::default()
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .add_tags(&["input"])
        .clean(html)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_paragraph() {
        let result = render_markdown("Hello, world!");
        assert_eq!(result.trim(), "<p>Hello, world!</p>");
    }

    #[test]
    fn test_heading() {
        let result = render_markdown("# Title");
        assert_eq!(result.trim(), "<h1>Title</h1>");
    }

    #[test]
    fn test_code_block() {
        let input = "```rust\nfn main() {}\n```";
        let result = render_markdown(input);
        assert!(result.contains("<code"));
        assert!(result.contains("fn main()"));
    }

    #[test]
    fn test_table() {
        let input = "| A | B |\n|---|---|\n| 1 | 2 |";
        let result = render_markdown(input);
        assert!(result.contains("<table>"));
        assert!(result.contains("<td>1</td>"));
    }

    #[test]
    fn test_task_list_survives_sanitizer() {
        let input = "- [x] done\n- [ ] not done";
        let result = render_markdown(input);
        assert!(result.contains("checkbox"));
        assert!(result.contains("checked"));
    }

    #[test]
    fn test_script_is_stripped() {
        let result = render_markdown("Hi <script>alert(1)</script>");
        assert!(!result.contains("<script"));
        assert!(result.contains("Hi"));
    }

    #[test]
    fn test_event_handler_is_stripped() {
        let result = render_markdown(r#"<img src="/a.png" onerror="alert(1)">"#);
        assert!(!result.contains("onerror"));
        assert!(result.contains("/a.png"));
    }

    #[test]
    fn test_mdx_component_tag_removed() {
        let result = render_markdown("<Callout>Note</Callout>\n\ntext");
        assert!(!result.contains("<Callout"));
        assert!(result.contains("text"));
    }

    #[test]
    fn test_links() {
        let result = render_markdown("[Outstatic](https://example.com)");
        assert!(result.contains("href=\"https://example.com\""));
        assert!(result.contains(">Outstatic</a>"));
    }

    #[test]
    fn test_empty_input() {
        let result = render_markdown("");
        assert_eq!(result, "");
    }
}
