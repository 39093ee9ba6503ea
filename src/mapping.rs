//! Projection of domain records onto a Notion database's property schema.
//!
//! Required properties are always written. Optional ones are left out of the
//! payload when the source value is empty, so an update never clears a value
//! already present in Notion.
use serde_json::{json, Map, Value};

use crate::config::PropertyNames;
use crate::model::{format_timestamp, DomainRecord, Issue, PullRequest, RecordHeader};

/// Notion rejects rich-text items longer than this many characters.
pub const RICH_TEXT_LIMIT: usize = 2000;

const NO_DESCRIPTION: &str = "No description provided.";

/// Kind-specific part of the mapping. Shared properties come from the header.
pub trait NotionMapping {
    fn header(&self) -> &RecordHeader;

    fn extra_properties(&self, fields: &PropertyNames, properties: &mut Map<String, Value>);

    /// Bullet facts listed under the "Details" heading of a new page.
    fn facts(&self) -> Vec<String>;
}

impl NotionMapping for PullRequest {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn extra_properties(&self, fields: &PropertyNames, properties: &mut Map<String, Value>) {
        if let (Some(name), Some(merged_at)) = (&fields.merged_at, &self.merged_at) {
            properties.insert(name.clone(), date_property(&format_timestamp(merged_at)));
        }
        if let Some(name) = &fields.branch {
            if !self.head_ref.is_empty() && !self.base_ref.is_empty() {
                properties.insert(name.clone(), rich_text_property(&self.branch_summary()));
            }
        }
    }

    fn facts(&self) -> Vec<String> {
        vec![
            format!("Branch: {}", self.branch_summary()),
            format!("Commits: {}", self.commits),
            format!("Changed files: {}", self.changed_files),
        ]
    }
}

impl PullRequest {
    fn branch_summary(&self) -> String {
        format!("{} → {}", self.head_ref, self.base_ref)
    }
}

impl NotionMapping for Issue {
    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn extra_properties(&self, fields: &PropertyNames, properties: &mut Map<String, Value>) {
        if let Some(name) = &fields.assignees {
            if !self.assignees.is_empty() {
                let joined = self
                    .assignees
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                properties.insert(name.clone(), rich_text_property(&joined));
            }
        }
        if let (Some(name), Some(milestone)) = (&fields.milestone, &self.milestone) {
            properties.insert(name.clone(), rich_text_property(milestone));
        }
    }

    fn facts(&self) -> Vec<String> {
        let mut facts = vec![
            format!("State: {}", self.header.status.as_str()),
            format!("Comments: {}", self.comments),
        ];
        if let Some(milestone) = &self.milestone {
            facts.push(format!("Milestone: {milestone}"));
        }
        facts
    }
}

impl DomainRecord {
    pub fn mapping(&self) -> &dyn NotionMapping {
        match self {
            DomainRecord::PullRequest(pr) => pr,
            DomainRecord::Issue(issue) => issue,
        }
    }
}

/// The property set written on both create and update.
pub fn build_properties(record: &dyn NotionMapping, fields: &PropertyNames) -> Map<String, Value> {
    let h = record.header();
    let mut properties = Map::new();
    properties.insert(fields.title.clone(), json!({ "title": rich_text(&h.title) }));
    properties.insert(fields.number.clone(), json!({ "number": h.number }));
    properties.insert(
        fields.status.clone(),
        json!({ "select": { "name": h.status.select_name() } }),
    );
    properties.insert(fields.author.clone(), rich_text_property(&h.author));
    if let Some(url) = &h.url {
        properties.insert(fields.url.clone(), json!({ "url": url }));
    }
    properties.insert(
        fields.created_at.clone(),
        date_property(&format_timestamp(&h.created_at)),
    );

    if let (Some(name), Some(closed_at)) = (&fields.closed_at, &h.closed_at) {
        properties.insert(name.clone(), date_property(&format_timestamp(closed_at)));
    }
    if let Some(name) = &fields.labels {
        if !h.labels.is_empty() {
            let options: Vec<Value> = h.labels.iter().map(|l| json!({ "name": l })).collect();
            properties.insert(name.clone(), json!({ "multi_select": options }));
        }
    }

    record.extra_properties(fields, &mut properties);
    properties
}

/// Page body written once, when the page record created.
pub fn build_content_blocks(record: &dyn NotionMapping) -> Vec<Value> {
    let body = record.header().body.trim();
    let description = if body.is_empty() { NO_DESCRIPTION } else { body };

    let mut blocks = vec![
        heading_block("Description"),
        json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text(description) }
        }),
        heading_block("Details"),
    ];
    blocks.extend(record.facts().iter().map(|fact| {
        json!({
            "object": "block",
            "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": rich_text(fact) }
        })
    }));
    blocks
}

fn heading_block(text: &str) -> Value {
    json!({
        "object": "block",
        "type": "heading_2",
        "heading_2": { "rich_text": rich_text(text) }
    })
}

fn rich_text_property(content: &str) -> Value {
    json!({ "rich_text": rich_text(content) })
}

fn date_property(start: &str) -> Value {
    json!({ "date": { "start": start } })
}

/// Split `content` into rich-text items that respect [`RICH_TEXT_LIMIT`].
pub fn rich_text(content: &str) -> Vec<Value> {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![json!({ "type": "text", "text": { "content": "" } })];
    }
    chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| {
            let piece: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": piece } })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordStatus;
    use std::collections::BTreeSet;

    fn header() -> RecordHeader {
        RecordHeader {
            number: 42,
            title: "Fix bug".into(),
            body: String::new(),
            author: "alice".into(),
            status: RecordStatus::Open,
            url: None,
            created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            closed_at: None,
            labels: BTreeSet::new(),
        }
    }

    fn pull_request() -> PullRequest {
        PullRequest {
            header: header(),
            merged_at: None,
            head_ref: "feature/x".into(),
            base_ref: "main".into(),
            commits: 2,
            changed_files: 4,
        }
    }

    fn issue() -> Issue {
        Issue {
            header: header(),
            assignees: BTreeSet::new(),
            comments: 0,
            milestone: None,
        }
    }

    #[test]
    fn required_properties_are_present() {
        let props = build_properties(&issue(), &PropertyNames::issues());
        assert_eq!(props["Title"]["title"][0]["text"]["content"], "Fix bug");
        assert_eq!(props["Issue Number"]["number"], 42);
        assert_eq!(props["Status"]["select"]["name"], "Open");
        assert_eq!(props["Author"]["rich_text"][0]["text"]["content"], "alice");
        assert_eq!(props["Created At"]["date"]["start"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn empty_optional_values_are_omitted() {
        let props = build_properties(&issue(), &PropertyNames::issues());
        for key in ["URL", "Closed At", "Labels", "Assignees", "Milestone"] {
            assert!(props.get(key).is_none(), "{key} should be omitted");
        }
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn optional_values_are_written_when_present() {
        let mut pr = pull_request();
        pr.header.status = RecordStatus::Merged;
        pr.header.url = Some("https://github.com/o/r/pull/42".into());
        pr.header.closed_at = Some("2024-01-03T00:00:00Z".parse().unwrap());
        pr.merged_at = Some("2024-01-03T00:00:00Z".parse().unwrap());
        pr.header.labels = ["bug", "ui"].into_iter().map(String::from).collect();

        let props = build_properties(&pr, &PropertyNames::pull_requests());
        assert_eq!(props["PR Number"]["number"], 42);
        assert_eq!(props["Status"]["select"]["name"], "Merged");
        assert_eq!(props["URL"]["url"], "https://github.com/o/r/pull/42");
        assert_eq!(props["Merged At"]["date"]["start"], "2024-01-03T00:00:00Z");
        assert_eq!(props["Closed At"]["date"]["start"], "2024-01-03T00:00:00Z");
        assert_eq!(props["Labels"]["multi_select"][0]["name"], "bug");
        assert_eq!(props["Labels"]["multi_select"][1]["name"], "ui");
        assert_eq!(
            props["Branch"]["rich_text"][0]["text"]["content"],
            "feature/x → main"
        );
    }

    #[test]
    fn disabled_property_names_are_never_written() {
        let mut pr = pull_request();
        pr.header.labels = ["bug"].into_iter().map(String::from).collect();
        let mut fields = PropertyNames::pull_requests();
        fields.labels = None;
        fields.branch = None;
        let props = build_properties(&pr, &fields);
        assert!(props.get("Labels").is_none());
        assert!(props.get("Branch").is_none());
    }

    #[test]
    fn issue_assignees_and_milestone() {
        let mut record = issue();
        record.assignees = ["dev2", "dev1"].into_iter().map(String::from).collect();
        record.milestone = Some("v1.0.0".into());
        let props = build_properties(&record, &PropertyNames::issues());
        assert_eq!(
            props["Assignees"]["rich_text"][0]["text"]["content"],
            "dev1, dev2"
        );
        assert_eq!(props["Milestone"]["rich_text"][0]["text"]["content"], "v1.0.0");
    }

    #[test]
    fn content_blocks_for_pull_request() {
        let blocks = build_content_blocks(&pull_request());
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0]["type"], "heading_2");
        assert_eq!(
            blocks[1]["paragraph"]["rich_text"][0]["text"]["content"],
            NO_DESCRIPTION
        );
        assert_eq!(
            blocks[3]["bulleted_list_item"]["rich_text"][0]["text"]["content"],
            "Branch: feature/x → main"
        );
        assert_eq!(
            blocks[5]["bulleted_list_item"]["rich_text"][0]["text"]["content"],
            "Changed files: 4"
        );
    }

    #[test]
    fn content_blocks_for_issue_include_milestone_only_when_set() {
        let mut record = issue();
        assert_eq!(build_content_blocks(&record).len(), 5);
        record.milestone = Some("v2".into());
        record.header.body = "Steps to reproduce".into();
        let blocks = build_content_blocks(&record);
        assert_eq!(blocks.len(), 6);
        assert_eq!(
            blocks[1]["paragraph"]["rich_text"][0]["text"]["content"],
            "Steps to reproduce"
        );
        assert_eq!(
            blocks[5]["bulleted_list_item"]["rich_text"][0]["text"]["content"],
            "Milestone: v2"
        );
    }

    #[test]
    fn long_text_is_split() {
        let text = "é".repeat(RICH_TEXT_LIMIT * 2 + 10);
        let items = rich_text(&text);
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[2]["text"]["content"].as_str().unwrap().chars().count(),
            10
        );
    }

    #[test]
    fn domain_record_dispatches_to_variant() {
        let record = DomainRecord::PullRequest(pull_request());
        let props = build_properties(record.mapping(), &PropertyNames::pull_requests());
        assert!(props.contains_key("Branch"));
    }
}
