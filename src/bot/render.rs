use crate::storage::{FeedRegistration, NormalizedItem};

/// Character budget for the description line of a delivered item.
const DESCRIPTION_LIMIT: usize = 200;

/// Format a normalized item for delivery: bolded title, truncated
/// description with an ellipsis only when something was actually cut, and a
/// link line prefixed with a link glyph.
pub fn render_item(item: &NormalizedItem) -> String {
    let mut message = format!("**{}**\n", item.title);

    if let Some(description) = &item.description {
        let mut chars = description.char_indices();
        match chars.nth(DESCRIPTION_LIMIT) {
            // More than the limit: cut at the char boundary and mark it
            Some((cut, _)) => {
                message.push_str(&description[..cut]);
                message.push_str("...");
            }
            None => message.push_str(description),
        }
        message.push_str("\n\n");
    }

    if let Some(link) = &item.link {
        message.push_str(&format!("🔗: {link}"));
    }

    message
}

/// Format the `list` reply for one channel's registrations.
pub fn render_feed_list(registrations: &[FeedRegistration]) -> String {
    let mut message = String::from("📡 **Configured Feeds:**\n");
    for (index, registration) in registrations.iter().enumerate() {
        let last_checked = match registration.last_checked_at {
            Some(ts) => chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "Never".to_string()),
            None => "Never".to_string(),
        };
        message.push_str(&format!(
            "{}. [{}] {}\n   Last checked: {}\n",
            index + 1,
            registration.feed_type.tag(),
            registration.url,
            last_checked
        ));
    }
    message
}

/// Help text sent for `help`, a bare mention, or an unrecognized command.
pub fn render_help(bot_name: &str) -> String {
    format!(
        "## AutoFeeds Help\n\n\
         `@{bot_name} add <url>` - Add an RSS/Atom/JSON feed to this channel\n\
         `@{bot_name} remove <url>` - Remove a feed from this channel\n\
         `@{bot_name} list` - List all feeds in this channel\n\
         `@{bot_name} check <url>` - Manually check a specific feed for new items\n\
         `@{bot_name} help` - Show this help message\n\n\
         **Supported Feed Types:**\n\
         - RSS 2.0\n\
         - Atom 1.0\n\
         - JSON Feed 1.0/1.1\n\n\
         Feeds are checked automatically on a fixed schedule."
    )
}
