//! Display fields for feed entries.

use wallarss_core::{Item, ItemDetail, Query};

pub fn item_title(item: &Item) -> String {
    format!("{} - {} {}", item.title, item.price, item.currency)
}

pub fn item_link(site_url: &str, item: &Item) -> String {
    format!("{}/item/{}", site_url.trim_end_matches('/'), item.web_slug)
}

/// Listing description followed by one `<img>` tag per image.
///
/// Uses the detail's full-size images, or the search thumbnails when the detail has none.
pub fn item_description(item: &Item, detail: &ItemDetail) -> String {
    let images = if detail.images.is_empty() { &item.images } else { &detail.images };
    let mut description = format!("{}<br/>", item.description);
    for image in images {
        description.push_str(&format!(r#"<img src="{image}"><br/>"#));
    }
    description
}

pub fn feed_title(query: &Query) -> String {
    format!("[{}] - Wallapop RSS", query.keywords.join(" "))
}

pub const FEED_DESCRIPTION: &str = "Wallapop RSS feed.";
