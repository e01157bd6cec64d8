use std::collections::HashSet;

use chrono::Utc;
use pulldown_cmark::{Options, Parser, html};
use uuid::Uuid;

use quill_db::models::{CommentRow, PostRow};

use crate::{Domain, DomainError, DomainResult};

/// Tags a post body may keep after sanitization.
const POST_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "pre", "strong",
    "ul", "h1", "h2", "h3", "p",
];

/// Comments keep inline formatting only.
const COMMENT_TAGS: &[&str] = &["a", "abbr", "acronym", "b", "code", "em", "i", "strong"];

/// Derive display HTML from a raw body: Markdown render, allow-list
/// sanitization, then bare-URL autolinking. Pure function of the body;
/// callers re-run it on every body mutation.
fn render(body: &str, allowed: &[&str]) -> String {
    let mut rendered = String::new();
    html::push_html(&mut rendered, Parser::new_ext(body, Options::empty()));

    let cleaned = ammonia::Builder::default()
        .tags(allowed.iter().copied().collect::<HashSet<_>>())
        .link_rel(Some("nofollow"))
        .clean(&rendered)
        .to_string();

    linkify(&cleaned)
}

pub fn render_post_html(body: &str) -> String {
    render(body, POST_TAGS)
}

pub fn render_comment_html(body: &str) -> String {
    render(body, COMMENT_TAGS)
}

/// Wrap bare http(s) URLs in text content with anchors. Input is
/// already-sanitized HTML; existing tags pass through untouched and
/// text inside an <a> element is never re-linked.
fn linkify(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut i = 0;
    let mut anchor_depth = 0usize;
    while i < html.len() {
        let rest = &html[i..];
        if rest.starts_with('<') {
            let end = rest.find('>').map(|p| i + p + 1).unwrap_or(html.len());
            let tag = &html[i..end];
            if tag.starts_with("<a ") || tag.starts_with("<a>") {
                anchor_depth += 1;
            } else if tag.starts_with("</a") {
                anchor_depth = anchor_depth.saturating_sub(1);
            }
            out.push_str(tag);
            i = end;
            continue;
        }
        let scheme_len = if rest.starts_with("https://") {
            "https://".len()
        } else if rest.starts_with("http://") {
            "http://".len()
        } else {
            0
        };
        if anchor_depth == 0 && scheme_len > 0 {
            let at_boundary = out
                .chars()
                .last()
                .is_none_or(|c| c.is_whitespace() || c == '>' || c == '(');
            if at_boundary {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '<')
                    .unwrap_or(rest.len());
                let mut url = &rest[..end];
                // Trailing punctuation belongs to the sentence, not the URL.
                while let Some(last) = url.chars().last() {
                    if ".,;:!?\"')".contains(last) {
                        url = &url[..url.len() - last.len_utf8()];
                    } else {
                        break;
                    }
                }
                // A scheme with no host is just text.
                if url.len() > scheme_len {
                    out.push_str("<a href=\"");
                    out.push_str(url);
                    out.push_str("\" rel=\"nofollow\">");
                    out.push_str(url);
                    out.push_str("</a>");
                    i += url.len();
                    continue;
                }
            }
        }
        let ch = rest.chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

impl Domain {
    pub fn create_post(&self, author_id: &str, body: &str) -> DomainResult<PostRow> {
        if body.trim().is_empty() {
            return Err(DomainError::validation("post does not have a body"));
        }
        let id = Uuid::new_v4().to_string();
        let body_html = render_post_html(body);
        self.db
            .insert_post(&id, body, &body_html, author_id, Utc::now())?;
        self.db.get_post(&id)?.ok_or(DomainError::NotFound)
    }

    /// Re-derives body_html; an edit is never allowed to leave stale HTML.
    pub fn edit_post(&self, post_id: &str, body: &str) -> DomainResult<PostRow> {
        if body.trim().is_empty() {
            return Err(DomainError::validation("post does not have a body"));
        }
        let body_html = render_post_html(body);
        if !self.db.update_post_body(post_id, body, &body_html)? {
            return Err(DomainError::NotFound);
        }
        self.db.get_post(post_id)?.ok_or(DomainError::NotFound)
    }

    pub fn create_comment(
        &self,
        author_id: &str,
        post_id: &str,
        body: &str,
    ) -> DomainResult<CommentRow> {
        if body.trim().is_empty() {
            return Err(DomainError::validation("comment does not have a body"));
        }
        if self.db.get_post(post_id)?.is_none() {
            return Err(DomainError::NotFound);
        }
        let id = Uuid::new_v4().to_string();
        let body_html = render_comment_html(body);
        self.db
            .insert_comment(&id, body, &body_html, author_id, post_id, Utc::now())?;
        self.db.get_comment(&id)?.ok_or(DomainError::NotFound)
    }

    /// Moderation: hide or restore a comment without deleting it.
    pub fn set_comment_disabled(&self, comment_id: &str, disabled: bool) -> DomainResult<()> {
        if !self.db.set_comment_disabled(comment_id, disabled)? {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_stripped_and_urls_are_linked() {
        let html = render_post_html("<script>x</script>hello http://a.com");
        assert!(!html.contains("script"));
        assert!(html.contains("hello"));
        assert!(html.contains("<a href=\"http://a.com\" rel=\"nofollow\">http://a.com</a>"));
    }

    #[test]
    fn posts_keep_headings_comments_do_not() {
        let body = "# Title\n\nsome **bold** text";
        let post = render_post_html(body);
        assert!(post.contains("<h1>Title</h1>"));
        assert!(post.contains("<strong>bold</strong>"));

        let comment = render_comment_html(body);
        assert!(!comment.contains("<h1>"));
        assert!(comment.contains("Title"));
        assert!(comment.contains("<strong>bold</strong>"));
    }

    #[test]
    fn markdown_links_are_not_double_linked() {
        let html = render_post_html("[site](http://a.com)");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn trailing_punctuation_stays_out_of_the_link() {
        let html = render_post_html("see https://example.com/x.");
        assert!(html.contains("href=\"https://example.com/x\""));
        assert!(html.contains("</a>."));
    }

    #[test]
    fn bare_scheme_is_not_a_link() {
        let html = render_post_html("just http:// nothing");
        assert!(!html.contains("<a "));

        let html = render_post_html("secure https:// nothing");
        assert!(!html.contains("<a "));
    }
}
