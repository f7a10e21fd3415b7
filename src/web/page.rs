use super::types::PageView;

const PAGE_TITLE: &str = "Bill Summarizer";

/// Escapes the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Renders the whole page: flashes, the submission form and the result area.
pub fn render(view: &PageView) -> String {
    let mut flashes = String::new();
    for flash in &view.flashes {
        flashes.push_str(&format!(
            "    <div class=\"alert alert-{}\" role=\"alert\">{}</div>\n",
            flash.level.as_str(),
            escape_html(&flash.message)
        ));
    }

    let result = if view.result.is_empty() {
        String::new()
    } else {
        let class = if view.result_is_error {
            "result result-error"
        } else {
            "result"
        };
        format!(
            "    <section class=\"{}\">\n      <h2>Summary</h2>\n      <p id=\"result\">{}</p>\n    </section>\n",
            class,
            escape_html(&view.result)
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
      body {{ font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
      textarea {{ width: 100%; min-height: 12rem; }}
      .alert {{ padding: .75rem 1rem; margin-bottom: 1rem; border-radius: .25rem; }}
      .alert-danger {{ background: #f8d7da; color: #842029; }}
      .alert-warning {{ background: #fff3cd; color: #664d03; }}
      .result {{ margin-top: 2rem; padding: 1rem; background: #f1f3f5; border-radius: .25rem; white-space: pre-wrap; }}
      .result-error {{ background: #f8d7da; }}
    </style>
  </head>
  <body>
    <h1>{title}</h1>
{flashes}    <form method="post" action="/" enctype="multipart/form-data">
      <label for="bill_text">Paste the text</label>
      <textarea id="bill_text" name="bill_text"></textarea>
      <p>or upload a PDF or image (pdf, png, jpg, jpeg, heic, heif)</p>
      <input type="file" id="file" name="file" accept=".pdf,.png,.jpg,.jpeg,.heic,.heif">
      <p><button type="submit">Summarize</button></p>
    </form>
{result}  </body>
</html>
"#,
        title = PAGE_TITLE,
        flashes = flashes,
        result = result,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::types::Flash;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>'"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;&#x27;"
        );
    }

    #[test]
    fn empty_view_renders_form_only() {
        let html = render(&PageView::default());
        assert!(html.contains(r#"name="bill_text""#));
        assert!(html.contains(r#"name="file""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(!html.contains("id=\"result\""));
        assert!(!html.contains("role=\"alert\""));
    }

    #[test]
    fn renders_flashes_and_escaped_result() {
        let view = PageView {
            flashes: vec![
                Flash::danger("Unsupported or missing file."),
                Flash::warning("No valid input found."),
            ],
            result: "Tax <b>relief</b>".to_string(),
            result_is_error: false,
        };
        let html = render(&view);
        assert!(html.contains(
            r#"<div class="alert alert-danger" role="alert">Unsupported or missing file.</div>"#
        ));
        assert!(html.contains(r#"<div class="alert alert-warning" role="alert">No valid input found.</div>"#));
        assert!(html.contains(r#"<p id="result">Tax &lt;b&gt;relief&lt;/b&gt;</p>"#));
        assert!(html.contains(r#"<section class="result">"#));
    }

    #[test]
    fn error_results_get_their_own_style() {
        let view = PageView {
            flashes: Vec::new(),
            result: "Unexpected AI response".to_string(),
            result_is_error: true,
        };
        assert!(render(&view).contains(r#"<section class="result result-error">"#));
    }
}
