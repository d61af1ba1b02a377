//! Minimal reading of the Atom feeds served by the Event Hubs (Service Bus) REST API.
//!
//! Only a handful of well known elements are needed, so they are matched by name,
//! ignoring XML namespace prefixes.

use std::sync::OnceLock;

use regex::Regex;

static ENTRY: OnceLock<Regex> = OnceLock::new();
static TITLE: OnceLock<Regex> = OnceLock::new();
static END_SEQUENCE_NUMBER: OnceLock<Regex> = OnceLock::new();
static LAST_ENQUEUED_OFFSET: OnceLock<Regex> = OnceLock::new();

/// Fields of a `PartitionDescription`, as returned when getting a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionField {
    EndSequenceNumber,
    LastEnqueuedOffset,
}

impl PartitionField {
    pub fn name(&self) -> &'static str {
        match self {
            PartitionField::EndSequenceNumber => "EndSequenceNumber",
            PartitionField::LastEnqueuedOffset => "LastEnqueuedOffset",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            PartitionField::EndSequenceNumber => element_pattern(&END_SEQUENCE_NUMBER, self.name()),
            PartitionField::LastEnqueuedOffset => element_pattern(&LAST_ENQUEUED_OFFSET, self.name()),
        }
    }
}

/// Titles of all the `<entry>` elements of a feed, in document order.
///
/// Consumer groups and partitions are listed as one entry each, titled with their name.
pub fn entry_titles(feed: &str) -> Vec<String> {
    let entry = element_pattern(&ENTRY, "entry");
    let title = element_pattern(&TITLE, "title");

    entry
        .captures_iter(feed)
        .filter_map(|entry_cap| {
            title.captures(entry_cap.get(1)?.as_str()).and_then(|title_cap| title_cap.get(1))
        })
        .map(|t| unescape(t.as_str().trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Text content of a field of a `PartitionDescription`.
pub fn partition_field(xml: &str, field: PartitionField) -> Option<String> {
    field.pattern().captures(xml).and_then(|c| c.get(1)).map(|m| unescape(m.as_str().trim()))
}

fn element_pattern(cell: &'static OnceLock<Regex>, tag: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(&format!(r"(?s)<(?:\w+:)?{tag}\b[^>]*>(.*?)</(?:\w+:)?{tag}>"))
            .unwrap_or_else(|e| panic!("Invalid pattern for element '{tag}': {e}"))
    })
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) const CONSUMER_GROUPS_FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">ConsumerGroups</title>
  <id>https://ns.servicebus.windows.net/hub/consumergroups?timeout=60&amp;api-version=2014-01</id>
  <updated>2024-03-01T12:00:00Z</updated>
  <link rel="self" href="https://ns.servicebus.windows.net/hub/consumergroups?timeout=60&amp;api-version=2014-01"/>
  <entry xml:base="https://ns.servicebus.windows.net/hub/consumergroups?timeout=60&amp;api-version=2014-01">
    <id>https://ns.servicebus.windows.net/hub/consumergroups/$Default?api-version=2014-01</id>
    <title type="text">$Default</title>
    <content type="application/xml"><ConsumerGroupDescription xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect"/></content>
  </entry>
  <entry xml:base="https://ns.servicebus.windows.net/hub/consumergroups?timeout=60&amp;api-version=2014-01">
    <id>https://ns.servicebus.windows.net/hub/consumergroups/billing?api-version=2014-01</id>
    <title type="text">billing &amp; invoicing</title>
  </entry>
</feed>"#;

    pub(crate) const PARTITION_ENTRY: &str = r#"<entry xmlns="http://www.w3.org/2005/Atom">
  <id>https://ns.servicebus.windows.net/hub/consumergroups/$Default/partitions/0?api-version=2014-01</id>
  <title type="text">0</title>
  <content type="application/xml">
    <PartitionDescription xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
      <SizeInBytes>1024</SizeInBytes>
      <BeginSequenceNumber>0</BeginSequenceNumber>
      <EndSequenceNumber>100</EndSequenceNumber>
      <IncomingBytesPerSecond>0</IncomingBytesPerSecond>
      <OutgoingBytesPerSecond>0</OutgoingBytesPerSecond>
      <LastEnqueuedOffset>500</LastEnqueuedOffset>
      <LastEnqueuedTimeUtc>2024-03-01T11:59:58Z</LastEnqueuedTimeUtc>
    </PartitionDescription>
  </content>
</entry>"#;

    #[test]
    fn titles_of_entries_only() {
        assert_eq!(entry_titles(CONSUMER_GROUPS_FEED), vec!["$Default", "billing & invoicing"]);
    }

    #[test]
    fn no_entries() {
        assert!(entry_titles(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Partitions</title></feed>"#)
            .is_empty());
    }

    #[test]
    fn reads_partition_fields() {
        assert_eq!(partition_field(PARTITION_ENTRY, PartitionField::EndSequenceNumber), Some("100".to_string()));
        assert_eq!(partition_field(PARTITION_ENTRY, PartitionField::LastEnqueuedOffset), Some("500".to_string()));
        assert_eq!(partition_field("<PartitionDescription/>", PartitionField::EndSequenceNumber), None);
    }

    #[test]
    fn ignores_namespace_prefix() {
        let xml = "<a:PartitionDescription><a:LastEnqueuedOffset>-1</a:LastEnqueuedOffset></a:PartitionDescription>";
        assert_eq!(partition_field(xml, PartitionField::LastEnqueuedOffset), Some("-1".to_string()));
    }
}
