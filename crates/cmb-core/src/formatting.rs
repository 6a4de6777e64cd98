//! Telegram HTML formatting for greetings, news and error reports.

use crate::{
    domain::{Actor, UserId},
    news::NewsItem,
    utils::truncate_text,
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Inline mention that links to the user's profile.
pub fn user_mention_html(id: UserId, name: &str) -> String {
    format!("<a href=\"tg://user?id={}\">{}</a>", id.0, escape_html(name))
}

pub fn greeting_html(member: &Actor, cause: &Actor) -> String {
    format!(
        "Hello {} was added by {}.\nWelcome to the community!",
        user_mention_html(member.id, &member.full_name),
        user_mention_html(cause.id, &cause.full_name),
    )
}

/// One news article as a message: bold title, body, link.
///
/// The result never exceeds `limit` characters. The link is kept whole when
/// possible, then the title, and the body gets what is left.
pub fn news_html(item: &NewsItem, limit: usize) -> String {
    let render = |title: &str, body: &str, url: &str| format!("<b>{title}</b>\n\n{body}\n\n{url}");

    let budget = limit.saturating_sub(render("", "", "").chars().count());
    let url = fit_escaped(item.url.trim(), budget);
    let title_budget = budget.saturating_sub(url.chars().count());
    let title = fit_escaped(item.title.trim(), title_budget);
    let body_budget = title_budget.saturating_sub(title.chars().count());
    let body = fit_escaped(item.body.trim(), body_budget);

    render(&title, &body, &url)
}

/// Report sent to the developer chat when an update handler fails.
pub fn error_report_html(update_dump: &str, error_chain: &str, limit: usize) -> String {
    const HEADER: &str = "An exception was raised while handling an update\n";

    // Both blocks share what is left after the fixed markup.
    let fixed = HEADER.len() + "<pre>update = </pre>\n\n<pre></pre>".len();
    let budget = limit.saturating_sub(fixed);
    let error = fit_escaped(error_chain, (budget / 2).max(1));
    let update = fit_escaped(update_dump, budget.saturating_sub(error.chars().count()));

    format!("{HEADER}<pre>update = {update}</pre>\n\n<pre>{error}</pre>")
}

fn fit_escaped(raw: &str, budget: usize) -> String {
    let mut max = raw.chars().count();
    loop {
        let out = escape_html(&truncate_text(raw, max));
        let len = out.chars().count();
        if len <= budget {
            return out;
        }
        if max == 0 {
            return String::new();
        }
        max = max.saturating_sub(len - budget);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        assert_eq!(escape_html("<b>&\"x\"</b>"), "&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;");
    }

    #[test]
    fn greeting_mentions_both_users() {
        let member = Actor {
            id: UserId(1),
            full_name: "Ann <A>".to_string(),
        };
        let cause = Actor {
            id: UserId(2),
            full_name: "Bob".to_string(),
        };
        assert_eq!(
            greeting_html(&member, &cause),
            "Hello <a href=\"tg://user?id=1\">Ann &lt;A&gt;</a> was added by \
<a href=\"tg://user?id=2\">Bob</a>.\nWelcome to the community!"
        );
    }

    #[test]
    fn news_html_escapes_and_fits_limit() {
        let item = NewsItem {
            id: 1,
            title: "BTC <up>".to_string(),
            body: "a & b ".repeat(200),
            url: "https://example.com/?a=1&b=2".to_string(),
        };
        let short = news_html(&item, 10_000);
        assert!(short.starts_with("<b>BTC &lt;up&gt;</b>\n\n"));
        assert!(short.ends_with("https://example.com/?a=1&amp;b=2"));

        let clipped = news_html(&item, 300);
        assert!(clipped.chars().count() <= 300);
        assert!(clipped.contains("...\n\n"));
        assert!(clipped.ends_with("https://example.com/?a=1&amp;b=2"));
    }

    #[test]
    fn news_html_clips_title_when_body_is_not_enough() {
        let item = NewsItem {
            id: 7,
            title: "<".repeat(5000),
            body: "short body".to_string(),
            url: "https://example.com/7".to_string(),
        };
        let html = news_html(&item, 4096);
        assert!(html.chars().count() <= 4096);
        assert!(html.starts_with("<b>&lt;&lt;"));
        assert!(html.contains("...</b>\n\n\n\nhttps://example.com/7"));
    }

    #[test]
    fn news_html_respects_tiny_limits() {
        let item = NewsItem {
            id: 8,
            title: "Title".to_string(),
            body: "Body".to_string(),
            url: "https://example.com/a-rather-long-link".to_string(),
        };
        for limit in [0, 5, 13, 20, 40] {
            assert!(news_html(&item, limit).chars().count() <= limit.max(11));
        }
    }

    #[test]
    fn error_report_fits_limit() {
        let dump = "{\"message\": \"<x>\"}".repeat(500);
        let report = error_report_html(&dump, "boom: caused by <io>", 4096);
        assert!(report.chars().count() <= 4096);
        assert!(report.starts_with("An exception was raised while handling an update\n"));
        assert!(report.contains("<pre>boom: caused by &lt;io&gt;</pre>"));
    }
}
