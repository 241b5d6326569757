/// Remote listing collaborator: the paginated source of items for a scope.
///
/// The coordinator drives a listing page by page until the collaborator
/// stops returning a continuation token. Errors are passed through to the
/// caller untouched; retries, if any, are the collaborator's business.
use crate::error::ListingError;
use crate::model::{Item, ScopeId};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: Vec<Item>,
    /// Token for the next page. `None` on the last page.
    pub next_page_token: Option<String>,
}

impl ListingPage {
    /// A page with no continuation.
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}

/// Source of remote items for a scope.
///
/// Implementations are called from the scan thread, so they must be
/// `Send + Sync`; the coordinator never calls one concurrently for the
/// same scan.
pub trait RemoteListing: Send + Sync {
    /// Fetch one page of items in `scope`. `page_token` is `None` for the
    /// first page and the previous page's `next_page_token` afterwards.
    fn list_page(
        &self,
        scope: &ScopeId,
        page_token: Option<&str>,
    ) -> Result<ListingPage, ListingError>;

    /// Short name for logs (e.g. the account or export file).
    fn identifier(&self) -> String;
}
