//! Code-to-image rendering contract
//!
//! Rendering a code snippet into a shareable PNG needs a headless browser,
//! which is a heavyweight external capability. This module keeps the
//! deterministic halves of the job - wrapping long lines and building the
//! editor-card HTML page the browser screenshots - and leaves the actual
//! screenshot behind the [`CodeImageRenderer`] trait.

use async_trait::async_trait;
use thiserror::Error;

/// Column width code is wrapped to before rendering.
pub const DEFAULT_WRAP_WIDTH: usize = 80;

/// Code-image rendering errors
#[derive(Debug, Error)]
pub enum CodeImageError {
    #[error("Code image rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a code snippet into PNG bytes.
#[async_trait]
pub trait CodeImageRenderer: Send + Sync {
    async fn render(&self, code: &str, language: &str) -> Result<Vec<u8>, CodeImageError>;
}

/// Wraps lines longer than `max_width` at whitespace.
///
/// Words longer than the width are left intact on their own line rather
/// than broken mid-token. Lines already within the width pass through
/// unchanged.
pub fn wrap_code(code: &str, max_width: usize) -> String {
    let mut wrapped = Vec::new();

    for line in code.split('\n') {
        if line.chars().count() <= max_width {
            wrapped.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.chars().count() + 1 + word.chars().count() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                wrapped.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            wrapped.push(current);
        }
    }

    wrapped.join("\n")
}

/// Builds the HTML page a browser-backed renderer screenshots: a dark
/// editor card with window controls, holding the (wrapped, escaped) code.
pub fn preview_html(code: &str, language: &str, max_width: usize) -> String {
    let wrapped = wrap_code(code, max_width);
    PREVIEW_TEMPLATE
        .replace("{language}", &escape_html(language))
        .replace("{code}", &escape_html(&wrapped))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const PREVIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Code Preview</title>
    <style>
        body {
            margin: 0;
            padding: 0;
            background: linear-gradient(135deg, #b388ff 0%, #7c4dff 100%);
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', 'Helvetica', 'Arial', sans-serif;
        }
        .editor-container {
            background-color: rgba(41, 42, 48, 0.85);
            border-radius: 12px;
            overflow: hidden;
            box-shadow: 0 20px 60px rgba(0, 0, 0, 0.3);
            width: 720px;
            margin: 40px;
        }
        .window-controls {
            background-color: rgba(58, 58, 58, 0.85);
            padding: 10px;
            display: flex;
            align-items: center;
        }
        .control {
            width: 12px;
            height: 12px;
            border-radius: 50%;
            margin-right: 6px;
        }
        .close { background-color: #FF5F56; }
        .minimize { background-color: #FFBD2E; }
        .maximize { background-color: #27C93F; }
        .code-content {
            padding: 20px;
            overflow-x: auto;
        }
        pre {
            margin: 0;
            white-space: pre-wrap;
            word-wrap: break-word;
        }
        code {
            font-family: 'SF Mono', 'Menlo', 'Monaco', 'Courier', monospace;
            font-size: 18px;
            line-height: 1.5;
        }
        .hljs {
            background-color: transparent !important;
            padding: 0 !important;
            color: #FFFFFF;
        }
        .hljs-keyword { color: #FF7AB2; }
        .hljs-string { color: #FF8170; }
        .hljs-number { color: #D9C97C; }
        .hljs-built_in { color: #78C2B3; }
        .hljs-function { color: #78C2B3; }
    </style>
</head>
<body>
    <div class="editor-container">
        <div class="window-controls">
            <div class="control close"></div>
            <div class="control minimize"></div>
            <div class="control maximize"></div>
        </div>
        <div class="code-content">
            <pre><code class="language-{language}">{code}</code></pre>
        </div>
    </div>

    <script src="https://cdnjs.cloudflare.com/ajax/libs/highlight.js/11.7.0/highlight.min.js"></script>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/highlight.js/11.7.0/styles/atom-one-dark.min.css">
    <script>hljs.highlightAll();</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_lines_pass_through() {
        let code = "fn main() {\n    println!(\"hi\");\n}";
        assert_eq!(wrap_code(code, 80), code);
    }

    #[test]
    fn test_long_line_wraps_at_whitespace() {
        let long = "let value = some_function(argument_one, argument_two, argument_three, argument_four);";
        let wrapped = wrap_code(long, 40);
        for line in wrapped.lines() {
            // no word is broken, so a single over-long token may exceed the
            // width, but none of these do
            assert!(line.chars().count() <= 40, "line too long: {line}");
        }
        // nothing lost
        let rejoined: Vec<&str> = wrapped.split_whitespace().collect();
        let original: Vec<&str> = long.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_overlong_token_left_intact() {
        let token = "a".repeat(120);
        let wrapped = wrap_code(&token, 80);
        assert_eq!(wrapped, token);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let code = "line one\n\nline two";
        assert_eq!(wrap_code(code, 80), code);
    }

    #[test]
    fn test_preview_html_embeds_escaped_code() {
        let html = preview_html("if a < b { return; }", "rust", 80);
        assert!(html.contains("language-rust"));
        assert!(html.contains("if a &lt; b { return; }"));
        assert!(html.contains("editor-container"));
    }

    #[test]
    fn test_preview_html_wraps_before_embedding() {
        let long = format!("let x = {};", "y + ".repeat(40));
        let html = preview_html(&long, "rust", 40);
        let code_part = html
            .split("<code class=\"language-rust\">")
            .nth(1)
            .unwrap()
            .split("</code>")
            .next()
            .unwrap();
        assert!(code_part.contains('\n'));
    }
}
