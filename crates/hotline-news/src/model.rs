//! The news tree data model.
//!
//! Serde derives double as the YAML snapshot schema, so field names here
//! are load-bearing: renaming one changes the on-disk format.

use hotline_protocol::HotlineDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire codes for the two node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Contains other nodes
    Bundle,
    /// Contains articles
    Category,
}

impl NodeKind {
    /// The type code clients see in listings
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Bundle => 2,
            Self::Category => 3,
        }
    }
}

/// One posted article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Title line
    pub title: String,
    /// Poster's user name at post time
    pub poster: String,
    /// Post time
    pub date: HotlineDate,
    /// Previous sibling in the thread, 0 when first
    #[serde(default)]
    pub prev: u32,
    /// Next sibling in the thread, 0 when last
    #[serde(default)]
    pub next: u32,
    /// Parent article, 0 for thread roots
    #[serde(default)]
    pub parent: u32,
    /// First reply, 0 when none
    #[serde(default)]
    pub first_child: u32,
    /// MIME flavor of the body; always "text/plain"
    pub flavor: String,
    /// Body text
    pub data: String,
}

/// One node of the news tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsNode {
    /// Bundle or category
    pub kind: NodeKind,
    /// 16-byte GUID; allocated at category creation
    #[serde(default)]
    pub guid: [u8; 16],
    /// Carried opaquely for clients that send it back
    #[serde(default)]
    pub add_sn: u32,
    /// Carried opaquely for clients that send it back
    #[serde(default)]
    pub delete_sn: u32,
    /// Child nodes by name; only bundles have them
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, NewsNode>,
    /// Articles by id; only categories have them
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub articles: BTreeMap<u32, Article>,
    /// Next article id to hand out; repaired from the id space on load
    #[serde(default)]
    pub next_article_id: u32,
}

impl NewsNode {
    /// A fresh empty bundle
    #[must_use]
    pub fn bundle() -> Self {
        Self {
            kind: NodeKind::Bundle,
            guid: [0; 16],
            add_sn: 0,
            delete_sn: 0,
            children: BTreeMap::new(),
            articles: BTreeMap::new(),
            next_article_id: 0,
        }
    }

    /// A fresh empty category with the given GUID
    #[must_use]
    pub fn category(guid: [u8; 16]) -> Self {
        Self {
            kind: NodeKind::Category,
            guid,
            add_sn: 0,
            delete_sn: 0,
            children: BTreeMap::new(),
            articles: BTreeMap::new(),
            next_article_id: 1,
        }
    }

    /// Number of children (bundles) or articles (categories), for listings
    #[must_use]
    pub fn item_count(&self) -> u16 {
        match self.kind {
            NodeKind::Bundle => self.children.len() as u16,
            NodeKind::Category => self.articles.len() as u16,
        }
    }

    /// Allocate the next article id
    pub fn allocate_article_id(&mut self) -> u32 {
        // Snapshots from older builds may lack the counter; repair it from
        // the highest id in use.
        if self.next_article_id == 0 {
            self.next_article_id = self.articles.keys().max().map_or(1, |m| m + 1);
        }
        let id = self.next_article_id;
        self.next_article_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(NodeKind::Bundle.code(), 2);
        assert_eq!(NodeKind::Category.code(), 3);
    }

    #[test]
    fn test_article_id_allocation_is_monotonic() {
        let mut cat = NewsNode::category([0; 16]);
        assert_eq!(cat.allocate_article_id(), 1);
        assert_eq!(cat.allocate_article_id(), 2);
        assert_eq!(cat.allocate_article_id(), 3);
    }

    #[test]
    fn test_id_counter_repaired_from_existing_articles() {
        let mut cat = NewsNode::category([0; 16]);
        cat.next_article_id = 0;
        cat.articles.insert(
            7,
            Article {
                title: "old".into(),
                poster: "someone".into(),
                date: HotlineDate::default(),
                prev: 0,
                next: 0,
                parent: 0,
                first_child: 0,
                flavor: "text/plain".into(),
                data: String::new(),
            },
        );
        assert_eq!(cat.allocate_article_id(), 8);
    }

    #[test]
    fn test_yaml_roundtrip_preserves_serial_numbers() {
        let mut cat = NewsNode::category([9; 16]);
        cat.add_sn = 123;
        cat.delete_sn = 456;

        let yaml = serde_yaml::to_string(&cat).unwrap();
        let back: NewsNode = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.add_sn, 123);
        assert_eq!(back.delete_sn, 456);
        assert_eq!(back.guid, [9; 16]);
    }
}
