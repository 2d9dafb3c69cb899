//! The news store: tree operations and snapshot persistence.
//!
//! One `tokio::sync::RwLock` guards the tree. Mutating operations hold the
//! write half across both the tree edit and the snapshot write, which
//! serializes snapshots and keeps the on-disk file ordered with the edits
//! that produced it. Reads take the shared half and never touch disk.

use crate::error::NewsError;
use crate::model::{Article, NewsNode, NodeKind};
use hotline_protocol::HotlineDate;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Summary row for a category/bundle listing
#[derive(Debug, Clone)]
pub struct NodeSummary {
    /// Node name
    pub name: String,
    /// Bundle or category
    pub kind: NodeKind,
    /// Category GUID (zeroed for bundles)
    pub guid: [u8; 16],
    /// Opaque serial number
    pub add_sn: u32,
    /// Opaque serial number
    pub delete_sn: u32,
    /// Child or article count
    pub item_count: u16,
}

/// The threaded news store
pub struct NewsStore {
    snapshot_path: PathBuf,
    root: RwLock<NewsNode>,
}

impl NewsStore {
    /// Open a store backed by the YAML snapshot at `path`.
    ///
    /// A missing snapshot yields an empty tree; the file appears on the
    /// first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing snapshot cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NewsError> {
        let snapshot_path = path.as_ref().to_path_buf();
        let root = match std::fs::read_to_string(&snapshot_path) {
            Ok(text) => serde_yaml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NewsNode::bundle(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            snapshot_path,
            root: RwLock::new(root),
        })
    }

    /// Ordered children of the node at `path`
    ///
    /// # Errors
    ///
    /// `PathNotFound` when the path names no node.
    pub async fn list_categories(&self, path: &[String]) -> Result<Vec<NodeSummary>, NewsError> {
        let root = self.root.read().await;
        let node = node_at(&root, path)?;
        Ok(node
            .children
            .iter()
            .map(|(name, child)| NodeSummary {
                name: name.clone(),
                kind: child.kind,
                guid: child.guid,
                add_sn: child.add_sn,
                delete_sn: child.delete_sn,
                item_count: child.item_count(),
            })
            .collect())
    }

    /// Articles of the category at `path`, ascending by id
    ///
    /// # Errors
    ///
    /// `PathNotFound` / `NotCategory`.
    pub async fn list_articles(&self, path: &[String]) -> Result<Vec<(u32, Article)>, NewsError> {
        let root = self.root.read().await;
        let node = category_at(&root, path)?;
        Ok(node.articles.iter().map(|(id, a)| (*id, a.clone())).collect())
    }

    /// One full article record
    ///
    /// # Errors
    ///
    /// `PathNotFound` / `NotCategory` / `ArticleNotFound`.
    pub async fn get_article(&self, path: &[String], id: u32) -> Result<Article, NewsError> {
        let root = self.root.read().await;
        let node = category_at(&root, path)?;
        node.articles
            .get(&id)
            .cloned()
            .ok_or(NewsError::ArticleNotFound(id))
    }

    /// Post an article, threading it under `parent_id` when nonzero.
    ///
    /// Returns the allocated id. The first reply becomes the parent's
    /// `first_child`; later replies are appended to the sibling chain.
    ///
    /// # Errors
    ///
    /// `ArticleNotFound` for a dangling parent id, plus path errors.
    pub async fn post_article(
        &self,
        path: &[String],
        parent_id: u32,
        title: &str,
        poster: &str,
        data: &str,
    ) -> Result<u32, NewsError> {
        let mut root = self.root.write().await;
        let node = category_at_mut(&mut root, path)?;

        if parent_id != 0 && !node.articles.contains_key(&parent_id) {
            return Err(NewsError::ArticleNotFound(parent_id));
        }

        let id = node.allocate_article_id();
        let mut article = Article {
            title: title.to_string(),
            poster: poster.to_string(),
            date: HotlineDate::now(),
            prev: 0,
            next: 0,
            parent: parent_id,
            first_child: 0,
            flavor: "text/plain".to_string(),
            data: data.to_string(),
        };

        if parent_id != 0 {
            let first_child = node.articles[&parent_id].first_child;
            if first_child == 0 {
                node.articles.get_mut(&parent_id).unwrap().first_child = id;
            } else {
                // Append to the sibling chain; bound the walk in case a
                // stale snapshot carries a corrupt loop.
                let mut last = first_child;
                for _ in 0..node.articles.len() {
                    match node.articles.get(&last) {
                        Some(a) if a.next != 0 => last = a.next,
                        _ => break,
                    }
                }
                if let Some(a) = node.articles.get_mut(&last) {
                    a.next = id;
                }
                article.prev = last;
            }
        }

        node.articles.insert(id, article);
        self.persist(&root).await?;
        Ok(id)
    }

    /// Delete an article.
    ///
    /// Non-recursive: the article is spliced out of its sibling chain and
    /// its direct replies become thread roots. Recursive: the article and
    /// every descendant are removed.
    ///
    /// # Errors
    ///
    /// `ArticleNotFound`, plus path errors.
    pub async fn delete_article(
        &self,
        path: &[String],
        id: u32,
        recursive: bool,
    ) -> Result<(), NewsError> {
        let mut root = self.root.write().await;
        let node = category_at_mut(&mut root, path)?;

        let target = node
            .articles
            .get(&id)
            .cloned()
            .ok_or(NewsError::ArticleNotFound(id))?;

        // Splice out of the sibling chain.
        if target.prev != 0 {
            if let Some(prev) = node.articles.get_mut(&target.prev) {
                prev.next = target.next;
            }
        }
        if target.next != 0 {
            if let Some(next) = node.articles.get_mut(&target.next) {
                next.prev = target.prev;
            }
        }
        if target.parent != 0 {
            if let Some(parent) = node.articles.get_mut(&target.parent) {
                if parent.first_child == id {
                    parent.first_child = target.next;
                }
            }
        }

        if recursive {
            let mut doomed = vec![id];
            let mut frontier = vec![id];
            while let Some(cur) = frontier.pop() {
                let children: Vec<u32> = node
                    .articles
                    .iter()
                    .filter(|(_, a)| a.parent == cur)
                    .map(|(aid, _)| *aid)
                    .collect();
                doomed.extend(&children);
                frontier.extend(children);
            }
            for aid in doomed {
                node.articles.remove(&aid);
            }
        } else {
            node.articles.remove(&id);
            for article in node.articles.values_mut() {
                if article.parent == id {
                    article.parent = 0;
                }
            }
        }

        self.persist(&root).await
    }

    /// Create a bundle or category under the bundle at `path`.
    ///
    /// Categories get a fresh random 16-byte GUID.
    ///
    /// # Errors
    ///
    /// `NotBundle` when `path` names a category, `AlreadyExists` on a name
    /// collision.
    pub async fn create_grouping(
        &self,
        path: &[String],
        name: &str,
        kind: NodeKind,
    ) -> Result<(), NewsError> {
        let mut root = self.root.write().await;
        let node = node_at_mut(&mut root, path)?;
        if node.kind != NodeKind::Bundle {
            return Err(NewsError::NotBundle(join(path)));
        }
        if node.children.contains_key(name) {
            return Err(NewsError::AlreadyExists(name.to_string()));
        }

        let child = match kind {
            NodeKind::Bundle => NewsNode::bundle(),
            NodeKind::Category => {
                let mut guid = [0u8; 16];
                getrandom::getrandom(&mut guid).expect("CSPRNG failure");
                NewsNode::category(guid)
            }
        };
        node.children.insert(name.to_string(), child);
        self.persist(&root).await
    }

    /// Remove the subtree named by `path`
    ///
    /// # Errors
    ///
    /// `PathNotFound` for the root path or a missing node.
    pub async fn delete_item(&self, path: &[String]) -> Result<(), NewsError> {
        let (prefix, name) = path
            .split_last()
            .map(|(n, p)| (p, n))
            .ok_or_else(|| NewsError::PathNotFound(String::new()))?;

        let mut root = self.root.write().await;
        let node = node_at_mut(&mut root, prefix)?;
        if node.children.remove(name).is_none() {
            return Err(NewsError::PathNotFound(join(path)));
        }
        self.persist(&root).await
    }

    /// Snapshot the whole tree: serialize, write a temp sibling, rename.
    async fn persist(&self, root: &NewsNode) -> Result<(), NewsError> {
        let yaml = serde_yaml::to_string(root)?;
        let tmp = self.snapshot_path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &self.snapshot_path).await?;
        tracing::debug!(path = %self.snapshot_path.display(), "news snapshot written");
        Ok(())
    }
}

fn join(path: &[String]) -> String {
    path.join("/")
}

fn node_at<'a>(root: &'a NewsNode, path: &[String]) -> Result<&'a NewsNode, NewsError> {
    let mut node = root;
    for name in path {
        node = node
            .children
            .get(name)
            .ok_or_else(|| NewsError::PathNotFound(join(path)))?;
    }
    Ok(node)
}

fn node_at_mut<'a>(root: &'a mut NewsNode, path: &[String]) -> Result<&'a mut NewsNode, NewsError> {
    let mut node = root;
    for name in path {
        node = node
            .children
            .get_mut(name)
            .ok_or_else(|| NewsError::PathNotFound(join(path)))?;
    }
    Ok(node)
}

fn category_at<'a>(root: &'a NewsNode, path: &[String]) -> Result<&'a NewsNode, NewsError> {
    let node = node_at(root, path)?;
    if node.kind != NodeKind::Category {
        return Err(NewsError::NotCategory(join(path)));
    }
    Ok(node)
}

fn category_at_mut<'a>(
    root: &'a mut NewsNode,
    path: &[String],
) -> Result<&'a mut NewsNode, NewsError> {
    let node = node_at_mut(root, path)?;
    if node.kind != NodeKind::Category {
        return Err(NewsError::NotCategory(join(path)));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    async fn store_with_category() -> (tempfile::TempDir, NewsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("ThreadedNews.yaml")).unwrap();
        store
            .create_grouping(&[], "general", NodeKind::Category)
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_threading_scenario() {
        let (_dir, store) = store_with_category().await;
        let cat = path(&["general"]);

        // First post: everything zero.
        let id1 = store
            .post_article(&cat, 0, "first", "alice", "body")
            .await
            .unwrap();
        assert_eq!(id1, 1);
        let a1 = store.get_article(&cat, 1).await.unwrap();
        assert_eq!((a1.prev, a1.next, a1.parent, a1.first_child), (0, 0, 0, 0));

        // First reply: becomes parent's first child.
        let id2 = store
            .post_article(&cat, 1, "re: first", "bob", "reply")
            .await
            .unwrap();
        assert_eq!(id2, 2);
        let a1 = store.get_article(&cat, 1).await.unwrap();
        assert_eq!(a1.first_child, 2);
        let a2 = store.get_article(&cat, 2).await.unwrap();
        assert_eq!((a2.parent, a2.prev, a2.next), (1, 0, 0));

        // Second reply: appended to the sibling chain.
        let id3 = store
            .post_article(&cat, 1, "re: first again", "carol", "reply 2")
            .await
            .unwrap();
        assert_eq!(id3, 3);
        let a2 = store.get_article(&cat, 2).await.unwrap();
        assert_eq!(a2.next, 3);
        let a3 = store.get_article(&cat, 3).await.unwrap();
        assert_eq!((a3.parent, a3.prev, a3.next), (1, 2, 0));
        let a1 = store.get_article(&cat, 1).await.unwrap();
        assert_eq!(a1.first_child, 2);
    }

    #[tokio::test]
    async fn test_post_to_dangling_parent_fails() {
        let (_dir, store) = store_with_category().await;
        let err = store
            .post_article(&path(&["general"]), 42, "t", "p", "d")
            .await
            .unwrap_err();
        assert!(matches!(err, NewsError::ArticleNotFound(42)));
    }

    #[tokio::test]
    async fn test_nonrecursive_delete_splices_chain_and_orphans_children() {
        let (_dir, store) = store_with_category().await;
        let cat = path(&["general"]);

        store.post_article(&cat, 0, "root", "a", "").await.unwrap(); // 1
        store.post_article(&cat, 1, "r1", "b", "").await.unwrap(); // 2
        store.post_article(&cat, 1, "r2", "c", "").await.unwrap(); // 3
        store.post_article(&cat, 1, "r3", "d", "").await.unwrap(); // 4
        store.post_article(&cat, 3, "deep", "e", "").await.unwrap(); // 5

        store.delete_article(&cat, 3, false).await.unwrap();

        // 2 and 4 are now adjacent siblings.
        let a2 = store.get_article(&cat, 2).await.unwrap();
        assert_eq!(a2.next, 4);
        let a4 = store.get_article(&cat, 4).await.unwrap();
        assert_eq!(a4.prev, 2);

        // 5 became a thread root.
        let a5 = store.get_article(&cat, 5).await.unwrap();
        assert_eq!(a5.parent, 0);

        assert!(matches!(
            store.get_article(&cat, 3).await,
            Err(NewsError::ArticleNotFound(3))
        ));
    }

    #[tokio::test]
    async fn test_delete_first_child_repoints_parent() {
        let (_dir, store) = store_with_category().await;
        let cat = path(&["general"]);

        store.post_article(&cat, 0, "root", "a", "").await.unwrap(); // 1
        store.post_article(&cat, 1, "r1", "b", "").await.unwrap(); // 2
        store.post_article(&cat, 1, "r2", "c", "").await.unwrap(); // 3

        store.delete_article(&cat, 2, false).await.unwrap();
        let a1 = store.get_article(&cat, 1).await.unwrap();
        assert_eq!(a1.first_child, 3);
        let a3 = store.get_article(&cat, 3).await.unwrap();
        assert_eq!(a3.prev, 0);
    }

    #[tokio::test]
    async fn test_recursive_delete_prunes_subtree() {
        let (_dir, store) = store_with_category().await;
        let cat = path(&["general"]);

        store.post_article(&cat, 0, "root", "a", "").await.unwrap(); // 1
        store.post_article(&cat, 1, "r1", "b", "").await.unwrap(); // 2
        store.post_article(&cat, 2, "deep", "c", "").await.unwrap(); // 3
        store.post_article(&cat, 0, "other", "d", "").await.unwrap(); // 4

        store.delete_article(&cat, 1, true).await.unwrap();

        let remaining = store.list_articles(&cat).await.unwrap();
        let ids: Vec<u32> = remaining.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let (_dir, store) = store_with_category().await;
        let cat = path(&["general"]);

        store.post_article(&cat, 0, "one", "a", "").await.unwrap();
        store.post_article(&cat, 0, "two", "a", "").await.unwrap();
        store.delete_article(&cat, 2, false).await.unwrap();

        let id = store.post_article(&cat, 0, "three", "a", "").await.unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn test_grouping_rules() {
        let (_dir, store) = store_with_category().await;

        // Bundles nest; categories do not contain groupings.
        store
            .create_grouping(&[], "bundle", NodeKind::Bundle)
            .await
            .unwrap();
        store
            .create_grouping(&path(&["bundle"]), "inner", NodeKind::Category)
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_grouping(&path(&["general"]), "nope", NodeKind::Bundle)
                .await,
            Err(NewsError::NotBundle(_))
        ));
        assert!(matches!(
            store.create_grouping(&[], "general", NodeKind::Category).await,
            Err(NewsError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_category_guids_are_random() {
        let (_dir, store) = store_with_category().await;
        store
            .create_grouping(&[], "second", NodeKind::Category)
            .await
            .unwrap();

        let listing = store.list_categories(&[]).await.unwrap();
        let guids: Vec<[u8; 16]> = listing.iter().map(|s| s.guid).collect();
        assert_ne!(guids[0], guids[1]);
        assert_ne!(guids[0], [0; 16]);
    }

    #[tokio::test]
    async fn test_delete_item_removes_subtree() {
        let (_dir, store) = store_with_category().await;
        store.delete_item(&path(&["general"])).await.unwrap();
        assert!(store.list_categories(&[]).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_item(&path(&["general"])).await,
            Err(NewsError::PathNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("ThreadedNews.yaml");

        {
            let store = NewsStore::open(&snapshot).unwrap();
            store
                .create_grouping(&[], "general", NodeKind::Category)
                .await
                .unwrap();
            store
                .post_article(&path(&["general"]), 0, "hello", "alice", "body")
                .await
                .unwrap();
        }

        let store = NewsStore::open(&snapshot).unwrap();
        let articles = store.list_articles(&path(&["general"])).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].1.title, "hello");
        // The id counter survives too.
        let id = store
            .post_article(&path(&["general"]), 0, "next", "bob", "")
            .await
            .unwrap();
        assert_eq!(id, 2);
    }
}
