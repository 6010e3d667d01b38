//! RSS and Atom parsing.

use lowpulse::digest::{format_items, parse_feed_items, DigestError, FeedItem};

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>SwimSwam</title>
    <link>https://swimswam.com</link>
    <item>
      <title>Record falls in the 200 fly</title>
      <link>https://swimswam.com/record-200-fly/</link>
      <description>Long text</description>
    </item>
    <item>
      <title><![CDATA[Trials & tribulations]]></title>
      <link>https://swimswam.com/trials/</link>
    </item>
    <item>
      <title>Coach Q&amp;A</title>
      <link>https://swimswam.com/qa/</link>
    </item>
  </channel>
</rss>"#;

fn item(title: &str, link: &str) -> FeedItem {
    FeedItem {
        title: title.to_owned(),
        link: link.to_owned(),
    }
}

#[test]
fn rss_items_are_parsed_in_order() {
    let items = match parse_feed_items(RSS, 10) {
        Ok(items) => items,
        Err(err) => panic!("feed should parse: {err}"),
    };
    assert_eq!(
        items,
        vec![
            item("Record falls in the 200 fly", "https://swimswam.com/record-200-fly/"),
            item("Trials & tribulations", "https://swimswam.com/trials/"),
            item("Coach Q&A", "https://swimswam.com/qa/"),
        ]
    );
}

#[test]
fn limit_caps_the_item_count() {
    let items = parse_feed_items(RSS, 2).expect("feed should parse");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].title, "Trials & tribulations");
}

#[test]
fn atom_entries_use_alternate_href() {
    let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
      <title>Blog</title>
      <entry>
        <title>Open water season</title>
        <link rel="self" href="https://example.com/self"/>
        <link rel="alternate" href="https://example.com/open-water"/>
      </entry>
    </feed>"#;
    let items = parse_feed_items(atom, 5).expect("feed should parse");
    assert_eq!(items, vec![item("Open water season", "https://example.com/open-water")]);
}

#[test]
fn malformed_feed_is_an_error() {
    let result = parse_feed_items("<rss><channel><item><title>x</link></item>", 5);
    assert!(matches!(result, Err(DigestError::Feed(_))));
}

#[test]
fn items_render_as_dash_lines() {
    let rendered = format_items(&[item("A", "https://a"), item("B", "https://b")]);
    assert_eq!(rendered, "- A\nhttps://a\n- B\nhttps://b");
}
