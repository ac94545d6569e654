//! HTML email composition.
//!
//! Every user-supplied string is escaped before it is embedded; the
//! composed output is rendered as HTML by mail clients. Missing optional
//! fields (project, due date, excerpt) render as omitted sections.

use chrono::NaiveDate;
use send_mail_module::OutgoingEmail;

use crate::digest::DigestBuckets;
use crate::store::{OpenTask, ResolvedUser};

use super::{AssignmentDetails, EntityKind, NotificationContext};

/// Content excerpts are cut at this many characters, with a trailing
/// `...` only when something was actually cut.
pub const EXCERPT_MAX_CHARS: usize = 200;

/// Task priority display mapping. Unrecognized values fall back to
/// medium styling rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Priority::Low => "#10b981",
            Priority::Medium => "#f59e0b",
            Priority::High => "#f97316",
            Priority::Urgent => "#ef4444",
        }
    }
}

fn status_label(raw: &str) -> &str {
    match raw {
        "backlog" => "Backlog",
        "not_started" => "Not started",
        "in_progress" => "In progress",
        "review" => "In review",
        other => other,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Strip tags and cut to [`EXCERPT_MAX_CHARS`] characters, appending an
/// ellipsis marker only if truncation occurred.
pub fn truncate_excerpt(html: &str) -> String {
    let text = strip_html_tags(html);
    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(EXCERPT_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}

fn format_due_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

const BODY_OPEN: &str = r#"<html>
  <head><meta charset="UTF-8"></head>
  <body style="font-family: Arial, sans-serif; color: #333; line-height: 1.6;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">"#;

const BODY_CLOSE: &str = r#"    </div>
  </body>
</html>"#;

const FOOTER: &str = r#"      <hr style="border: none; border-top: 1px solid #e5e7eb; margin: 30px 0;">
      <p style="font-size: 12px; color: #9ca3af; margin: 0;">
        This is an automated notification from TaskFlow. Please do not reply to this email.
      </p>"#;

fn header_block(title: &str) -> String {
    format!(
        r#"      <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 30px; border-radius: 10px 10px 0 0;">
        <h1 style="color: white; margin: 0; font-size: 24px;">{title}</h1>
      </div>
      <div style="background: #f9fafb; padding: 30px; border-radius: 0 0 10px 10px; border: 1px solid #e5e7eb;">"#
    )
}

/// Compose the mention-notification email for one resolved user.
///
/// Subject and wording are keyed by the triggering entity; the comment
/// variant embeds a sanitized excerpt of the comment body.
pub fn compose_mention_email(
    user: &ResolvedUser,
    context: &NotificationContext,
) -> OutgoingEmail {
    let subject = match context.entity {
        EntityKind::Task => format!("You were mentioned in a task: {}", context.title),
        EntityKind::Comment => format!("You were mentioned in a comment on: {}", context.title),
    };

    let where_word = match context.entity {
        EntityKind::Task => "a task",
        EntityKind::Comment => "a comment",
    };

    let mut body = String::new();
    body.push_str(BODY_OPEN);
    body.push_str(&header_block("You were mentioned"));
    body.push_str(&format!(
        r#"
        <p style="font-size: 16px; margin-bottom: 20px;">
          <strong>{actor}</strong> mentioned you in {where_word}:
        </p>
        <div style="background: white; padding: 20px; border-radius: 8px; border-left: 4px solid #667eea; margin-bottom: 20px;">
          <h2 style="margin: 0 0 10px 0; font-size: 18px; color: #1f2937;">{title}</h2>"#,
        actor = escape_html(&context.actor_name),
        title = escape_html(&context.title),
    ));
    if let Some(project) = context
        .project_name
        .as_deref()
        .filter(|name| !name.is_empty())
    {
        body.push_str(&format!(
            r#"
          <p style="margin: 5px 0; color: #6b7280; font-size: 14px;">Project: {}</p>"#,
            escape_html(project)
        ));
    }
    body.push_str("\n        </div>");

    if context.entity == EntityKind::Comment {
        if let Some(content) = context.content.as_deref() {
            let excerpt = truncate_excerpt(content);
            if !excerpt.is_empty() {
                body.push_str(&format!(
                    r#"
        <div style="background: white; padding: 15px; border-radius: 8px; margin-bottom: 20px; border: 1px solid #e5e7eb;">
          <p style="margin: 0; color: #4b5563; font-size: 14px;">{}</p>
        </div>"#,
                    escape_html(&excerpt)
                ));
            }
        }
    }

    body.push('\n');
    body.push_str(FOOTER);
    body.push('\n');
    body.push_str(BODY_CLOSE);

    OutgoingEmail {
        to: user.email.clone(),
        subject,
        message: body,
        reply_to: user.email.clone(),
    }
}

/// Compose the task-assignment email for the assignee.
pub fn compose_assignment_email(
    user: &ResolvedUser,
    details: &AssignmentDetails,
) -> OutgoingEmail {
    let priority = Priority::parse(&details.priority);
    let subject = format!("New task assigned to you: {}", details.task_title);

    let mut body = String::new();
    body.push_str(BODY_OPEN);
    body.push_str(&header_block("New task"));
    body.push_str(&format!(
        r#"
        <p style="font-size: 16px; margin-bottom: 20px;">
          <strong>{actor}</strong> assigned a new task to you:
        </p>
        <div style="background: white; padding: 20px; border-radius: 8px; border-left: 4px solid #667eea; margin-bottom: 20px;">
          <h2 style="margin: 0 0 10px 0; font-size: 18px; color: #1f2937;">{title}</h2>"#,
        actor = escape_html(&details.actor_name),
        title = escape_html(&details.task_title),
    ));
    if let Some(project) = details
        .project_name
        .as_deref()
        .filter(|name| !name.is_empty())
    {
        body.push_str(&format!(
            r#"
          <p style="margin: 5px 0; color: #6b7280; font-size: 14px;">Project: {}</p>"#,
            escape_html(project)
        ));
    }
    body.push_str(&format!(
        r#"
          <p style="margin: 5px 0; font-size: 14px;">
            <span style="display: inline-block; padding: 4px 12px; border-radius: 12px; background-color: {color}20; color: {color}; font-weight: 500;">
              Priority: {label}
            </span>
          </p>"#,
        color = priority.color(),
        label = priority.label(),
    ));
    if let Some(due) = details.due_date {
        body.push_str(&format!(
            r#"
          <p style="margin: 5px 0; color: #6b7280; font-size: 14px;">Due date: {}</p>"#,
            format_due_date(due)
        ));
    }
    body.push_str(&format!(
        r#"
        </div>
        <div style="background: #e0e7ff; padding: 15px; border-radius: 8px; border-left: 3px solid #667eea; margin-bottom: 20px;">
          <p style="margin: 0; color: #4338ca; font-size: 14px; font-weight: 500;">
            Sign in to TaskFlow to start working on the task.
          </p>
        </div>
{FOOTER}
"#
    ));
    body.push_str(BODY_CLOSE);

    OutgoingEmail {
        to: user.email.clone(),
        subject,
        message: body,
        reply_to: user.email.clone(),
    }
}

struct BucketSection {
    heading: &'static str,
    note: Option<&'static str>,
    background: &'static str,
    border: &'static str,
    heading_color: &'static str,
}

fn task_card(task: &OpenTask) -> String {
    let priority = Priority::parse(&task.priority);
    let project_line = task
        .project_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(|name| {
            format!(
                r#"
        <div style="font-size: 12px; color: #6b7280; margin-bottom: 5px;">Project: {}</div>"#,
                escape_html(name)
            )
        })
        .unwrap_or_default();
    let due_line = task
        .due_date
        .map(|date| {
            format!(
                r#"<span style="color: #6b7280; font-size: 12px;">Due {}</span>"#,
                format_due_date(date)
            )
        })
        .unwrap_or_default();

    format!(
        r#"
      <div style="background: white; padding: 12px; border-radius: 6px; margin-bottom: 10px; border: 1px solid #e5e7eb;">
        <div style="font-weight: 600; color: #1f2937; margin-bottom: 5px;">{title}</div>{project_line}
        <div style="display: flex; gap: 10px; align-items: center; flex-wrap: wrap;">
          <span style="display: inline-block; padding: 3px 8px; border-radius: 12px; background-color: {color}20; color: {color}; font-size: 11px; font-weight: 500;">{priority}</span>
          <span style="color: #6b7280; font-size: 12px;">{status}</span>
          {due_line}
        </div>
      </div>"#,
        title = escape_html(&task.title),
        color = priority.color(),
        priority = priority.label(),
        status = escape_html(status_label(&task.status)),
    )
}

fn bucket_section(section: &BucketSection, tasks: &[OpenTask]) -> String {
    let mut out = format!(
        r#"
      <div style="background: {background}; border-left: 4px solid {border}; padding: 15px; border-radius: 8px; margin-bottom: 20px;">
        <h3 style="color: {heading_color}; margin: 0 0 10px 0; font-size: 16px;">{heading} ({count})</h3>"#,
        background = section.background,
        border = section.border,
        heading_color = section.heading_color,
        heading = section.heading,
        count = tasks.len(),
    );
    if let Some(note) = section.note {
        out.push_str(&format!(
            r#"
        <div style="color: #7f1d1d; font-size: 13px; margin-bottom: 10px;">{note}</div>"#
        ));
    }
    for task in tasks {
        out.push_str(&task_card(task));
    }
    out.push_str("\n      </div>");
    out
}

/// Compose one daily digest email from the user's bucketed open tasks.
///
/// Only non-empty buckets render, in the fixed order overdue, due
/// today, due this week, no due date.
pub fn compose_digest_email(user: &ResolvedUser, buckets: &DigestBuckets) -> OutgoingEmail {
    let total = buckets.total();
    let subject = format!("Daily summary: you have {total} open tasks");

    let mut sections = String::new();
    let ordered: [(BucketSection, &[OpenTask]); 4] = [
        (
            BucketSection {
                heading: "Overdue tasks",
                note: Some("These tasks are past their due date."),
                background: "#fef2f2",
                border: "#ef4444",
                heading_color: "#991b1b",
            },
            &buckets.overdue,
        ),
        (
            BucketSection {
                heading: "Due today",
                note: None,
                background: "#fffbeb",
                border: "#f59e0b",
                heading_color: "#92400e",
            },
            &buckets.due_today,
        ),
        (
            BucketSection {
                heading: "Due this week",
                note: None,
                background: "#eff6ff",
                border: "#3b82f6",
                heading_color: "#1e40af",
            },
            &buckets.due_this_week,
        ),
        (
            BucketSection {
                heading: "No due date",
                note: None,
                background: "#f9fafb",
                border: "#9ca3af",
                heading_color: "#374151",
            },
            &buckets.no_due_date,
        ),
    ];
    for (section, tasks) in &ordered {
        if !tasks.is_empty() {
            sections.push_str(&bucket_section(section, tasks));
        }
    }

    let mut body = String::new();
    body.push_str(BODY_OPEN);
    body.push_str(&format!(
        r#"      <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 30px; border-radius: 10px 10px 0 0;">
        <h1 style="color: white; margin: 0; font-size: 26px;">Daily task summary</h1>
        <p style="color: #e0e7ff; margin: 10px 0 0 0; font-size: 14px;">Hi {name}, here are your open tasks</p>
      </div>
      <div style="background: #f9fafb; padding: 30px; border-radius: 0 0 10px 10px; border: 1px solid #e5e7eb;">
        <div style="display: grid; grid-template-columns: repeat(2, 1fr); gap: 15px; margin-bottom: 30px;">
          <div style="background: white; padding: 20px; border-radius: 8px; text-align: center; border: 1px solid #e5e7eb;">
            <div style="font-size: 32px; font-weight: bold; color: #667eea;">{total}</div>
            <div style="color: #6b7280; font-size: 14px;">Open tasks</div>
          </div>
          <div style="background: white; padding: 20px; border-radius: 8px; text-align: center; border: 1px solid #e5e7eb;">
            <div style="font-size: 32px; font-weight: bold; color: #ef4444;">{overdue}</div>
            <div style="color: #6b7280; font-size: 14px;">Overdue</div>
          </div>
        </div>{sections}
        <div style="background: #e0e7ff; padding: 15px; border-radius: 8px; border-left: 3px solid #667eea; margin-top: 30px;">
          <p style="margin: 0; color: #4338ca; font-size: 14px; font-weight: 500;">
            Sign in to TaskFlow to update your tasks.
          </p>
        </div>
{FOOTER}
"#,
        name = escape_html(&user.full_name),
        overdue = buckets.overdue.len(),
    ));
    body.push_str(BODY_CLOSE);

    OutgoingEmail {
        to: user.email.clone(),
        subject,
        message: body,
        reply_to: user.email.clone(),
    }
}
