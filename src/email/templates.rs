/// Email template functions
use super::{send_email, EmailResult};

/// Text and HTML bodies of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub text: String,
    pub html: String,
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Account notice sent on behalf of the moderation team.
pub fn render_user_notification(
    site_name: &str,
    recipient: &str,
    subject: &str,
    message: &str,
) -> RenderedEmail {
    let text = format!(
        r#"Hello {},

{}

If you have questions, reply to this email and our support team will get back to you.

---
{}
"#,
        recipient, message, site_name
    );

    let paragraphs: String = message
        .split("\n\n")
        .map(|p| format!("        <p>{}</p>\n", escape_html(p).replace('\n', "<br>")))
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{subject}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>{subject}</h2>
        <p>Hello <strong>{recipient}</strong>,</p>
{paragraphs}        <hr style="margin: 30px 0; border: none; border-top: 1px solid #ddd;">
        <p style="color: #666; font-size: 0.9em;">
            If you have questions, reply to this email and our support team will get back to you.
        </p>
        <p style="color: #666; font-size: 0.9em;">{site}</p>
    </div>
</body>
</html>"#,
        subject = escape_html(subject),
        recipient = escape_html(recipient),
        paragraphs = paragraphs,
        site = escape_html(site_name),
    );

    RenderedEmail { text, html }
}

/// Send an account notice to a user
pub async fn send_user_notification(
    to: &str,
    recipient: &str,
    subject: &str,
    message: &str,
) -> EmailResult<()> {
    let site_name = crate::app_config::site().name;
    let email = render_user_notification(&site_name, recipient, subject, message);
    send_email(to, subject, &email.text, Some(&email.html)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_body_is_escaped() {
        let email = render_user_notification(
            "Carmarket",
            "Ali <ali@example.com>",
            "Account blocked",
            "Reason: <script>alert(1)</script>",
        );
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("Ali &lt;ali@example.com&gt;"));
        assert!(email.text.contains("Reason: <script>alert(1)</script>"));
    }

    #[test]
    fn test_paragraphs_and_line_breaks() {
        let email = render_user_notification("Carmarket", "Ayşe", "Hi", "one\ntwo\n\nthree");
        assert!(email.html.contains("<p>one<br>two</p>"));
        assert!(email.html.contains("<p>three</p>"));
    }
}
