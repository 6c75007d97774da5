use crate::config::{FailurePolicy, PolicyConfig};
use crate::context::ScrapeContext;
use crate::error::{CollectError, Result};
use crate::models::{Page, PageRequest};
use crate::tfe::{Listable, TfeApi};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Fetches pages of one entity kind for one organization. Every call goes
/// through the context, so cancellation is observed before and during each
/// request. Failures carry the organization and page they happened on.
pub struct PaginatedLister<'a> {
    api: &'a dyn TfeApi,
    ctx: &'a ScrapeContext,
    organization: &'a str,
    page_size: u32,
}

impl<'a> PaginatedLister<'a> {
    pub fn new(
        api: &'a dyn TfeApi,
        ctx: &'a ScrapeContext,
        organization: &'a str,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            ctx,
            organization,
            page_size: page_size.max(1),
        }
    }

    pub fn organization(&self) -> &str {
        self.organization
    }

    pub async fn fetch_page<T: Listable>(&self, page: u32) -> Result<Page<T>> {
        let req = PageRequest::new(page, self.page_size).with_include(T::INCLUDE);
        self.ctx
            .guard(T::list(self.api, self.organization, req))
            .await?
            .map_err(|source| CollectError::RemoteList {
                kind: T::KIND,
                organization: self.organization.to_string(),
                page,
                source,
            })
    }

    pub fn cursor<T: Listable>(&self) -> PageCursor<'_, 'a, T> {
        PageCursor {
            lister: self,
            page_number: 1,
            total_pages: None,
            _kind: std::marker::PhantomData,
        }
    }

    /// Every entity across all pages, in response order. The first failing
    /// page aborts the whole listing.
    pub async fn list_all<T: Listable>(&self) -> Result<Vec<T>> {
        let mut cursor = self.cursor::<T>();
        let mut all = Vec::new();
        while let Some(items) = cursor.next().await? {
            all.extend(items);
        }
        Ok(all)
    }
}

/// Walks pages `1..=total_pages`, where the total comes from the first
/// response.
pub struct PageCursor<'l, 'a, T> {
    lister: &'l PaginatedLister<'a>,
    page_number: u32,
    total_pages: Option<u32>,
    _kind: std::marker::PhantomData<fn() -> T>,
}

impl<T: Listable> PageCursor<'_, '_, T> {
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// No more pages can be fetched. A failed first page leaves the total
    /// unknown, which also ends the walk.
    pub fn is_exhausted(&self) -> bool {
        match self.total_pages {
            Some(total) => self.page_number > total.max(1),
            None => self.page_number > 1,
        }
    }

    /// Fetches the next page. The cursor advances even when the fetch fails,
    /// so a caller that tolerates failures can keep going.
    pub async fn next(&mut self) -> Result<Option<Vec<T>>> {
        if self.is_exhausted() {
            return Ok(None);
        }
        let page = self.page_number;
        self.page_number += 1;

        let resp = self.lister.fetch_page::<T>(page).await?;
        let pagination = resp.pagination;
        if self.total_pages.is_none() {
            self.total_pages = Some(pagination.total_pages);
        }
        tracing::debug!(
            "{}: {} page {}/{} ({} of {} items)",
            self.lister.organization,
            T::KIND,
            pagination.current_page,
            pagination.total_pages,
            resp.items.len(),
            pagination.total_count
        );
        Ok(Some(resp.items))
    }

    /// Like [`next`](Self::next), but a failed page of a kind whose policy is
    /// [`FailurePolicy::Degrade`] is logged and skipped. Cancellation and
    /// deadlines are never skipped.
    pub async fn next_with_policy(&mut self, policy: &PolicyConfig) -> Result<Option<Vec<T>>> {
        loop {
            match self.next().await {
                Err(e @ CollectError::RemoteList { .. })
                    if policy.for_kind(T::KIND) == FailurePolicy::Degrade =>
                {
                    tracing::warn!("skipping {} page: {e}", T::KIND);
                    if self.is_exhausted() {
                        return Ok(None);
                    }
                }
                other => return other,
            }
        }
    }
}
