//! Template rendering utilities using Tera
//!
//! Every message template is parsed once into a process-wide `Tera`
//! instance on first use and never mutated afterwards, so rendering is safe
//! from concurrent dispatches.

use std::error::Error as StdError;

use lazy_static::lazy_static;
use tera::{Context, Tera};

use crate::{Error, Result};

pub const HOST_EXPIRATION_EMAIL_SUBJECT: &str = "host_expiration_email_subject";
pub const HOST_EXPIRATION_EMAIL_BODY: &str = "host_expiration_email_body.html";
pub const HOST_EXPIRATION_SLACK_BODY: &str = "host_expiration_slack_body";
pub const VOLUME_EXPIRATION_EMAIL_SUBJECT: &str = "volume_expiration_email_subject";
pub const VOLUME_EXPIRATION_EMAIL_BODY: &str = "volume_expiration_email_body.html";
pub const VOLUME_EXPIRATION_SLACK_BODY: &str = "volume_expiration_slack_body";
pub const TICKET_DESCRIPTION: &str = "ticket_description";

/// Display format for expiration timestamps, e.g. `Mon Jan 2 15:04:05 UTC 2006`.
pub const EXPIRATION_TIME_FORMAT: &str = "%a %b %-d %H:%M:%S %Z %Y";

const TICKET_DESCRIPTION_TEMPLATE: &str = r#"
h2. [{{ task.display_name }} failed on {{ task.build_variant }}|{{ ui_root }}/task/{{ task.id }}/{{ task.execution }}]

Host: [{{ host.host }}|{{ ui_root }}/host/{{ host.id }}]
Project: [{{ task.project }}|{{ ui_root }}/waterfall/{{ task.project }}]

{% for test in tests %}*{{ test.name }}* - [Logs|{{ test.url }}] | [History|{{ test.history_url }}]

{% endfor %}

~BF Ticket Generated by [~{{ user_id }}]~
"#;

// HTML bodies escape interpolated values. Chat and ticket markup stays raw.
const ESCAPED_SUFFIXES: &[&str] = &[".html"];

/// Escapes the characters that can break out of HTML text or a quoted
/// attribute. Unlike Tera's default, `/` is left alone so links stay readable.
fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
    output
}

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        tera.autoescape_on(ESCAPED_SUFFIXES.to_vec());
        tera.set_escape_fn(escape_html);
        tera.add_raw_templates(vec![
            (
                HOST_EXPIRATION_EMAIL_SUBJECT,
                "{{ distro }} host termination reminder",
            ),
            (
                HOST_EXPIRATION_EMAIL_BODY,
                r#"Your {{ distro }} host with id {{ id }} will be terminated at {{ expiration_time }}. Visit the <a href="{{ url }}">spawnhost page</a> to extend its lifetime."#,
            ),
            (
                HOST_EXPIRATION_SLACK_BODY,
                "Your {{ distro }} host with id {{ id }} will be terminated at {{ expiration_time }}. Visit the <{{ url }}|spawnhost page> to extend its lifetime.",
            ),
            (VOLUME_EXPIRATION_EMAIL_SUBJECT, "Volume termination reminder"),
            (
                VOLUME_EXPIRATION_EMAIL_BODY,
                r#"Your volume with id {{ id }} will be terminated at {{ expiration_time }}. Visit the <a href="{{ url }}">volume page</a> to extend its lifetime."#,
            ),
            (
                VOLUME_EXPIRATION_SLACK_BODY,
                "Your volume with id {{ id }} will be terminated at {{ expiration_time }}. Visit the <{{ url }}|volume page> to extend its lifetime.",
            ),
            (TICKET_DESCRIPTION, TICKET_DESCRIPTION_TEMPLATE),
        ])
        .expect("built-in notification templates must parse");
        tera
    };
}

/// Render one of the built-in templates.
///
/// A failure here means the template references data the caller did not
/// supply; the error carries Tera's full cause chain.
pub fn render(name: &str, context: &Context) -> Result<String> {
    TEMPLATES
        .render(name, context)
        .map_err(|e| Error::Template(format!("failed to render '{}': {}", name, describe(&e))))
}

fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
