//! Following `LastEvaluatedKey` across `Query` and `Scan` pages.
//!
//! A cursor is not stored anywhere: each page carries the key the next
//! request must start from, and a page without one ends the sequence. The
//! number of pages is unbounded; callers that need a limit can `take` from
//! the stream.

use crate::codec::unmarshall_json;
use crate::error::{protocol, Error};
use crate::value::Item;
use futures::stream::{self, Stream, TryStreamExt};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::future::Future;

/// One page of a `Query` or `Scan`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in the order the service returned them
    pub items: Vec<Item>,
    pub count: u64,
    pub scanned_count: u64,
    /// Continuation key; `None` once the sequence is exhausted
    pub last_evaluated_key: Option<Item>,
    pub consumed_capacity: Option<Json>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPage {
    #[serde(default)]
    items: Vec<Map<String, Json>>,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    scanned_count: u64,
    last_evaluated_key: Option<Map<String, Json>>,
    consumed_capacity: Option<Json>,
}

impl Page {
    pub(crate) fn from_response(body: Json) -> Result<Self, Error> {
        let raw: RawPage = protocol(body, "page response")?;
        Ok(Self {
            items: raw
                .items
                .into_iter()
                .map(|item| unmarshall_json(Json::Object(item)))
                .collect::<Result<_, _>>()?,
            count: raw.count,
            scanned_count: raw.scanned_count,
            // an empty key means the same as no key
            last_evaluated_key: raw
                .last_evaluated_key
                .filter(|key| !key.is_empty())
                .map(|key| unmarshall_json(Json::Object(key)))
                .transpose()?,
            consumed_capacity: raw.consumed_capacity,
        })
    }

    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }
}

enum Cursor {
    Start(Option<Item>),
    Next(Item),
    Done,
}

/// Stream pages by calling `fetch` with each continuation key in turn.
///
/// The first call receives `start`; each later call receives the previous
/// page's `last_evaluated_key` unchanged. The stream ends after the first
/// page without one, or after the first error.
pub fn paginate<'a, F, Fut>(start: Option<Item>, fetch: F) -> impl Stream<Item = Result<Page, Error>> + 'a
where
    F: FnMut(Option<Item>) -> Fut + 'a,
    Fut: Future<Output = Result<Page, Error>> + 'a,
{
    stream::try_unfold((Cursor::Start(start), fetch), |(cursor, mut fetch)| async move {
        let start_key = match cursor {
            Cursor::Start(key) => key,
            Cursor::Next(key) => Some(key),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(start_key).await?;
        let next = match &page.last_evaluated_key {
            Some(key) => Cursor::Next(key.clone()),
            None => Cursor::Done,
        };
        Ok(Some((page, (next, fetch))))
    })
}

/// Drain a page stream, concatenating items in page-arrival order.
pub async fn collect_items<S>(pages: S) -> Result<Vec<Item>, Error>
where
    S: Stream<Item = Result<Page, Error>>,
{
    pages
        .try_fold(Vec::new(), |mut items, page| async move {
            items.extend(page.items);
            Ok(items)
        })
        .await
}
