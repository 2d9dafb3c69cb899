//! Threaded-news handlers and their wire encodings.

use super::{int_field, required_field};
use crate::error::HandlerError;
use crate::server::Server;
use crate::session::Session;
use hotline_protocol::access::Access;
use hotline_protocol::transaction::{Field, Transaction};
use hotline_protocol::types::fields;
use hotline_protocol::FilePath;
use hotline_news::{Article, NodeKind, NodeSummary};
use std::sync::Arc;

/// Parse the request's news path (absent means the root)
fn news_path(tx: &Transaction) -> Result<Vec<String>, HandlerError> {
    match tx.field(fields::NEWS_PATH) {
        Some(f) => Ok(FilePath::parse(&f.data)?.components_lossy()),
        None => Ok(Vec::new()),
    }
}

/// Category/bundle listing entry (field 323).
///
/// Bundles: `Type[2] Count[2] NameLen[1] Name`. Categories additionally
/// carry `GUID[16] AddSN[4] DeleteSN[4]` between the count and the name.
fn category_list_entry(summary: &NodeSummary) -> Field {
    let name = summary.name.as_bytes();
    let mut data = Vec::with_capacity(29 + name.len());
    data.extend_from_slice(&summary.kind.code().to_be_bytes());
    data.extend_from_slice(&summary.item_count.to_be_bytes());
    if summary.kind == NodeKind::Category {
        data.extend_from_slice(&summary.guid);
        data.extend_from_slice(&summary.add_sn.to_be_bytes());
        data.extend_from_slice(&summary.delete_sn.to_be_bytes());
    }
    data.push(name.len().min(255) as u8);
    data.extend_from_slice(&name[..name.len().min(255)]);
    Field::new(fields::NEWS_CAT_LIST_DATA15, data)
}

/// Article listing payload (field 321): a zero id/name header, the
/// article count, then one summary record per article in id order.
fn article_list_payload(articles: &[(u32, Article)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0u8; 4]); // list id
    data.extend_from_slice(&(articles.len() as u32).to_be_bytes());
    data.push(0); // name
    data.push(0); // description

    for (id, article) in articles {
        data.extend_from_slice(&id.to_be_bytes());
        data.extend_from_slice(&article.date.to_bytes());
        data.extend_from_slice(&article.parent.to_be_bytes());
        data.extend_from_slice(&[0u8; 4]); // flags
        data.extend_from_slice(&1u16.to_be_bytes()); // flavor count

        let title = article.title.as_bytes();
        data.push(title.len().min(255) as u8);
        data.extend_from_slice(&title[..title.len().min(255)]);

        let poster = article.poster.as_bytes();
        data.push(poster.len().min(255) as u8);
        data.extend_from_slice(&poster[..poster.len().min(255)]);

        let flavor = article.flavor.as_bytes();
        data.push(flavor.len().min(255) as u8);
        data.extend_from_slice(flavor);

        data.extend_from_slice(&(article.data.len().min(u16::MAX as usize) as u16).to_be_bytes());
    }
    data
}

/// `GetNewsCatNameList` (370)
pub async fn get_news_cat_name_list(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let listing = server.news.list_categories(&path).await?;
    Ok(vec![Transaction::reply_to(
        tx,
        listing.iter().map(category_list_entry).collect(),
    )])
}

/// `GetNewsArtNameList` (371)
pub async fn get_news_art_name_list(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let articles = server.news.list_articles(&path).await?;
    Ok(vec![Transaction::reply_to(
        tx,
        vec![Field::new(
            fields::NEWS_ART_LIST_DATA,
            article_list_payload(&articles),
        )],
    )])
}

/// `GetNewsArtData` (400): one full article with thread pointers
pub async fn get_news_art_data(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let id = required_field(tx, fields::NEWS_ART_ID, "article id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed article id.".to_string()))?
        as u32;

    let article = server.news.get_article(&path, id).await?;

    Ok(vec![Transaction::reply_to(
        tx,
        vec![
            Field::new(fields::NEWS_ART_TITLE, article.title.into_bytes()),
            Field::new(fields::NEWS_ART_POSTER, article.poster.into_bytes()),
            Field::new(fields::NEWS_ART_DATE, article.date.to_bytes().to_vec()),
            Field::u32(fields::NEWS_ART_PREV_ART, article.prev),
            Field::u32(fields::NEWS_ART_NEXT_ART, article.next),
            Field::u32(fields::NEWS_ART_PARENT_ART, article.parent),
            Field::u32(fields::NEWS_ART_FIRST_CHILD_ART, article.first_child),
            Field::new(fields::NEWS_ART_DATA_FLAV, article.flavor.into_bytes()),
            Field::new(fields::NEWS_ART_DATA, article.data.into_bytes()),
        ],
    )])
}

/// `PostNewsArt` (410): the `NewsArtID` field names the parent article
pub async fn post_news_art(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let parent = int_field(tx, fields::NEWS_ART_ID).unwrap_or(0) as u32;
    let title = tx
        .field(fields::NEWS_ART_TITLE)
        .map(|f| f.as_text())
        .unwrap_or_default();
    let body = tx
        .field(fields::NEWS_ART_DATA)
        .map(|f| f.as_text())
        .unwrap_or_default();
    let poster = String::from_utf8_lossy(&session.display_name()).into_owned();

    let id = server
        .news
        .post_article(&path, parent, &title, &poster, &body)
        .await?;
    tracing::info!(session = session.id, article = id, "news article posted");

    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `DelNewsArt` (411): `NewsArtRecurseDel` selects subtree pruning
pub async fn del_news_art(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let id = required_field(tx, fields::NEWS_ART_ID, "article id")?
        .as_int()
        .ok_or_else(|| HandlerError::BadRequest("Malformed article id.".to_string()))?
        as u32;
    let recursive = int_field(tx, fields::NEWS_ART_RECURSE_DEL).unwrap_or(0) != 0;

    server.news.delete_article(&path, id, recursive).await?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `DelNewsItem` (380): the capability depends on what the path names
pub async fn del_news_item(
    server: &Server,
    session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let (prefix, name) = path
        .split_last()
        .map(|(n, p)| (p.to_vec(), n.clone()))
        .ok_or_else(|| HandlerError::BadRequest("Cannot delete the news root.".to_string()))?;

    let listing = server.news.list_categories(&prefix).await?;
    let kind = listing
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.kind)
        .ok_or_else(|| HandlerError::NotFound(format!("News path not found: {name}")))?;

    let required = match kind {
        NodeKind::Category => (Access::NewsDeleteCat, "You are not allowed to delete news categories."),
        NodeKind::Bundle => (Access::NewsDeleteFolder, "You are not allowed to delete news bundles."),
    };
    if !session.has_access(required.0) {
        return Err(HandlerError::Denied(required.1.to_string()));
    }

    server.news.delete_item(&path).await?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `NewNewsFolder` (381): bundles are named by the `FileName` field
pub async fn new_news_folder(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let name = required_field(tx, fields::FILE_NAME, "bundle name")?.as_text();

    server
        .news
        .create_grouping(&path, &name, NodeKind::Bundle)
        .await?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}

/// `NewNewsCategory` (382)
pub async fn new_news_category(
    server: &Server,
    _session: &Arc<Session>,
    tx: &Transaction,
) -> Result<Vec<Transaction>, HandlerError> {
    let path = news_path(tx)?;
    let name = required_field(tx, fields::NEWS_CAT_NAME, "category name")?.as_text();

    server
        .news
        .create_grouping(&path, &name, NodeKind::Category)
        .await?;
    Ok(vec![Transaction::reply_to(tx, vec![])])
}
