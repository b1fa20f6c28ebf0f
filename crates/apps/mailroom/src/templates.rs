//! Markup templates for every document fragment
//!
//! Templates are pure functions from a field snapshot to [`Markup`].
//! Absent fields render as empty text. Escaping happens when the markup
//! is serialized, never here.

use chrono::Local;
use mail::{Attributes, Mailbox, parse_date, value_count, value_text, value_truthy};

use crate::dom::{Element, Markup, el, fragment, text};

/// Field of a snapshot as display text
fn field(record: &Attributes, name: &str) -> String {
    value_text(record.get(name))
}

/// Format a backend date for display, keeping the raw text when it is
/// not RFC 3339
pub fn display_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date
            .with_timezone(&Local)
            .format("%b %d, %Y at %H:%M")
            .to_string(),
        None => raw.to_string(),
    }
}

fn nav_link(label: &str, href: &str) -> Element {
    el("li").child(el("a").attr("href", href).text(label))
}

fn nav_header(label: &str) -> Element {
    el("li").class("nav-header").text(label)
}

fn divider() -> Element {
    el("li").class("divider")
}

fn icon_button(class: &str, icon: &str, label: &str) -> Element {
    el("a")
        .class(class)
        .child(el("i").class(icon))
        .text(label)
}

/// Page skeleton: alert area, sidebar, content column and footer
pub fn app() -> Markup {
    el("div")
        .class("container-fluid")
        .child(el("div").id("alerts"))
        .child(
            el("div")
                .class("row-fluid")
                .child(
                    el("div")
                        .id("sidebar")
                        .class("span2")
                        .child(el("div").id("menu_container").class("well sidebar-nav")),
                )
                .child(el("div").id("content").class("span10")),
        )
        .child(
            el("div")
                .class("row-fluid")
                .child(el("div").class("span12").child(el("footer").child(el("p").text("© Mailroom")))),
        )
        .into()
}

/// Sidebar navigation with the slot for the mailbox list
pub fn menu() -> Markup {
    fragment([
        el("ul")
            .class("nav nav-list")
            .child(nav_header("All your mail"))
            .child(nav_link("Inbox", "#").class("active"))
            .child(nav_link("Sent", "#"))
            .child(nav_link("Drafts", "#"))
            .child(nav_link("Bin", "#"))
            .child(divider())
            .child(nav_header("Mailboxes"))
            .into(),
        el("ul").id("menu_mailboxes").class("nav nav-list").into(),
        el("ul")
            .class("nav nav-list")
            .child(nav_link("add/modify", "#config-mailboxes"))
            .child(divider())
            .child(nav_header("Filters"))
            .child(nav_link("Marked", "#"))
            .child(nav_link("New", "#"))
            .child(nav_link("Today", "#"))
            .child(nav_link("Yesterday", "#"))
            .into(),
    ])
}

/// Two columns: mail list and mail detail
pub fn layout_mails() -> Markup {
    el("div")
        .class("row-fluid")
        .child(el("div").id("column_mails_list").class("column span4"))
        .child(el("div").id("column_mail").class("column span8"))
        .into()
}

/// Mailbox configuration: the list and the add button below it
pub fn layout_mailboxes() -> Markup {
    fragment([
        el("div")
            .class("row-fluid")
            .child(el("div").id("mail_list_container").class("span12"))
            .into(),
        el("div")
            .class("row-fluid")
            .child(el("div").id("add_mail_button_container").class("span12"))
            .into(),
    ])
}

/// Mail column: the table body rows go into and the "more" slot
pub fn mails() -> Markup {
    fragment([
        el("table")
            .class("table table-striped")
            .child(el("tbody").id("mails_list_container"))
            .into(),
        el("div").id("button_load_more_mails").into(),
    ])
}

pub fn mails_more() -> Markup {
    el("div")
        .class("btn-group pull-left")
        .child(icon_button(
            "button_more_mails btn btn-primary",
            "icon-plus",
            "Load 25 older messages",
        ))
        .into()
}

/// Cells of one row in the mail list
pub fn mail_list(mail: &Attributes, active: bool) -> Markup {
    fragment([
        el("td")
            .class_if(active, "active_mail")
            .child(
                el("p")
                    .text(field(mail, "from"))
                    .child(el("br"))
                    .child(
                        el("i")
                            .attr("style", "color: lightgray;")
                            .text(display_date(&field(mail, "date"))),
                    ),
            )
            .child(el("p").text(field(mail, "subject")))
            .into(),
        el("td")
            .child(
                el("a")
                    .class("btn btn-mini choose_mail_button")
                    .child(el("i").class("icon-arrow-right")),
            )
            .into(),
    ])
}

/// Detail of the active mail. Renders an empty card when none is active.
pub fn mail_big(mail: Option<&Attributes>) -> Markup {
    let empty = Attributes::new();
    let mail = mail.unwrap_or(&empty);
    fragment([
        el("div")
            .class("well")
            .child(
                el("p").text(field(mail, "from")).child(
                    el("i")
                        .attr("style", "color: lightgray;")
                        .text(display_date(&field(mail, "date"))),
                ),
            )
            .child(el("h4").text(field(mail, "subject")))
            .child(el("div").class("mail_body").text(field(mail, "html")))
            .into(),
        el("div")
            .class("btn-toolbar")
            .child(
                el("div")
                    .class("btn-group")
                    .child(icon_button("btn btn-primary", "icon-share-alt", "Answer"))
                    .child(icon_button("btn", "icon-share-alt", "Answer to all"))
                    .child(icon_button("btn", "icon-arrow-up", "Forward")),
            )
            .child(
                el("div")
                    .class("btn-group")
                    .child(icon_button("btn btn-warning", "icon-star", "Important"))
                    .child(icon_button("btn", "icon-ban-circle", "Spam"))
                    .child(icon_button("btn btn-danger", "icon-remove", "Delete")),
            )
            .into(),
    ])
}

/// Read-only mailbox card
pub fn mailbox(record: &Attributes) -> Markup {
    el("form")
        .child(el("strong").text(field(record, Mailbox::NAME_FIELD)))
        .child(text(": "))
        .child(el("i").text(format!("\"{}\" ", field(record, Mailbox::SMTP_SEND_AS))))
        .child(text(format!(
            "{}@{}",
            field(record, Mailbox::LOGIN),
            field(record, Mailbox::IMAP_SERVER)
        )))
        .child(el("a").class("edit_mailbox isntEdit btn").text("Edit"))
        .child(
            el("a")
                .class("delete_mailbox isntEdit btn btn-danger")
                .text("Delete"),
        )
        .into()
}

/// Mailbox edit form: one input per editable field, keyed by field name
pub fn mailbox_edit(record: &Attributes) -> Markup {
    let inputs = Mailbox::EDITABLE.iter().map(|name| {
        Markup::from(
            el("input")
                .id(*name)
                .class("content")
                .attr("value", field(record, name)),
        )
    });
    fragment(inputs.chain([
        el("input")
            .attr("type", "submit")
            .attr("value", "Save")
            .class("save_mailbox isEdit btn btn-success")
            .into(),
        el("a")
            .class("cancel_edit_mailbox isEdit btn btn-warning")
            .text("Cancel")
            .into(),
    ]))
}

/// Sidebar entry: checkbox, name and unread badge
pub fn mailbox_menu(record: &Attributes) -> Markup {
    let id = field(record, "id");
    let unread = value_count(record.get(Mailbox::NEW_MESSAGES));
    let checkbox = el("input")
        .attr("type", "checkbox")
        .attr("mailbox_id", id.clone())
        .attr_if(value_truthy(record.get(Mailbox::CHECKED)), "checked", "checked")
        .class("change_mailboxes_list");

    let mut link = el("a")
        .attr("mailbox_id", id)
        .class("change_mailboxes_list")
        .child(checkbox)
        .text(format!(" {}", field(record, Mailbox::NAME_FIELD)));
    if unread > 0 {
        link = link.child(el("span").class("badge badge-warning").text(unread.to_string()));
    }
    link.into()
}

pub fn mailbox_new() -> Markup {
    el("form")
        .class("well")
        .child(el("a").id("add_mailbox").class("btn").text("Add a new mailbox"))
        .into()
}

/// Dismissable alert listing transport failures; empty when there are none
pub fn error_banner(messages: &[String]) -> Markup {
    if messages.is_empty() {
        return fragment([]);
    }
    el("div")
        .class("alert alert-error")
        .child(el("a").class("close close_alert").text("×"))
        .children(messages.iter().map(|message| el("p").text(message.as_str())))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::Resource;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_mailbox_card() {
        let html = mailbox(&record(json!({
            "name": "Work <main>",
            "SMTP_send_as": "Ada",
            "login": "ada",
            "IMAP_server": "imap.example.com"
        })))
        .to_html();

        assert!(html.contains("<strong>Work &lt;main&gt;</strong>"));
        assert!(html.contains("&quot;Ada&quot; "));
        assert!(html.contains("ada@imap.example.com"));
        assert!(html.contains(r#"class="edit_mailbox isntEdit btn""#));
    }

    #[test]
    fn test_absent_fields_render_empty() {
        let html = mailbox(&Attributes::new()).to_html();
        assert!(html.starts_with("<form><strong></strong>: <i>&quot;&quot; </i>@<a"));
    }

    #[test]
    fn test_mailbox_edit_inputs() {
        let html = mailbox_edit(&Mailbox::defaults()).to_html();
        assert!(html.contains(r#"<input id="IMAP_port" value="993" class="content">"#));
        assert!(html.contains(r#"<input id="SMTP_ssl" value="true" class="content">"#));
        assert_eq!(html.matches("class=\"content\"").count(), Mailbox::EDITABLE.len());
        assert!(html.contains("save_mailbox"));
    }

    #[test]
    fn test_mailbox_menu_checkbox_and_badge() {
        let checked = mailbox_menu(&record(json!({
            "id": "3", "name": "Work", "checked": true, "new_messages": 2
        })))
        .to_html();
        assert!(checked.contains(r#"mailbox_id="3" checked="checked""#));
        assert!(checked.contains(r#"<span class="badge badge-warning">2</span>"#));

        let unchecked = mailbox_menu(&record(json!({
            "id": "3", "name": "Work", "checked": false
        })))
        .to_html();
        assert!(!unchecked.contains("checked=\"checked\""));
        assert!(!unchecked.contains("badge"));
    }

    #[test]
    fn test_mail_list_marks_active_row() {
        let mail = record(json!({"from": "Ada", "date": "yesterday", "subject": "Hi"}));
        let active = mail_list(&mail, true).to_html();
        let idle = mail_list(&mail, false).to_html();

        assert!(active.starts_with(r#"<td class="active_mail">"#));
        assert!(idle.starts_with("<td><p>Ada<br>"));
        assert!(idle.contains("yesterday"));
        assert!(idle.contains("choose_mail_button"));
    }

    #[test]
    fn test_mail_big_escapes_body() {
        let mail = record(json!({"subject": "Hello", "html": "<p>Hi</p>"}));
        let html = mail_big(Some(&mail)).to_html();
        assert!(html.contains("<h4>Hello</h4>"));
        assert!(html.contains("&lt;p&gt;Hi&lt;/p&gt;"));

        let empty = mail_big(None).to_html();
        assert!(empty.contains("<h4></h4>"));
    }

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("not a date"), "not a date");
        assert!(display_date("2012-06-01T12:00:00Z").contains("2012"));
    }

    #[test]
    fn test_error_banner() {
        assert_eq!(error_banner(&[]).to_html(), "");
        let html = error_banner(&["server responded with status 500".to_string()]).to_html();
        assert!(html.contains("close_alert"));
        assert!(html.contains("<p>server responded with status 500</p>"));
    }

    #[test]
    fn test_layouts_expose_anchors() {
        assert!(layout_mails().to_html().contains(r#"id="column_mails_list""#));
        assert!(layout_mailboxes().to_html().contains(r#"id="add_mail_button_container""#));
        assert!(mails().to_html().contains(r#"<tbody id="mails_list_container">"#));
        assert!(menu().to_html().contains(r##"href="#config-mailboxes""##));
        assert!(app().to_html().contains(r#"id="menu_container""#));
    }
}
