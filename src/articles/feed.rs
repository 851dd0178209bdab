use tracing::{debug, warn};

use crate::api::{ApiError, Article, ArticleQuery, ContentApi, ListResponse, SortOrder};
use crate::articles::debounce::Debouncer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFilters {
    pub search: String,
    pub title_exact: String,
    pub category_name: String,
    pub sort: SortOrder,
    pub page: u32,
}

impl Default for ArticleFilters {
    fn default() -> Self {
        Self {
            search: String::new(),
            title_exact: String::new(),
            category_name: String::new(),
            sort: SortOrder::default(),
            page: 1,
        }
    }
}

impl ArticleFilters {
    /// Same result set, ignoring which page is selected.
    pub fn same_selection(&self, other: &ArticleFilters) -> bool {
        self.search == other.search
            && self.title_exact == other.title_exact
            && self.category_name == other.category_name
            && self.sort == other.sort
    }

    pub fn query(&self, page: u32) -> ArticleQuery {
        ArticleQuery {
            page,
            search: self.search.clone(),
            title_exact: self.title_exact.clone(),
            category_name: self.category_name.clone(),
            sort: self.sort,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    pub articles: Vec<Article>,
    pub total_pages: u32,
    pub current_page: u32,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            articles: Vec::new(),
            total_pages: 1,
            current_page: 1,
            is_loading: false,
            error: None,
        }
    }
}

/// Handed out by [`ArticleFeed::begin_fetch`] and given back with the
/// response. Only the ticket of the newest request is honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    page: u32,
    reset: bool,
    query: ArticleQuery,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_reset(&self) -> bool {
        self.reset
    }

    pub fn query(&self) -> &ArticleQuery {
        &self.query
    }
}

/// Paginated article list driven by filters, with append-on-scroll.
///
/// A filter change always restarts from page one and supersedes whatever
/// request is in flight; a next-page request is refused while another
/// request is loading. Responses carrying an outdated generation are
/// dropped on arrival.
#[derive(Debug, Default)]
pub struct ArticleFeed {
    state: FeedState,
    filters: ArticleFilters,
    generation: u64,
    search_input: Debouncer<String>,
    title_input: Debouncer<String>,
}

impl ArticleFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(filters: ArticleFilters) -> Self {
        Self {
            filters: ArticleFilters { page: 1, ..filters },
            ..Self::default()
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn filters(&self) -> &ArticleFilters {
        &self.filters
    }

    pub fn articles(&self) -> &[Article] {
        &self.state.articles
    }

    pub fn has_more(&self) -> bool {
        self.state.current_page < self.state.total_pages
    }

    /// Replaces the filters. Returns `true` when the selection changed,
    /// in which case the page is back at one and the caller should run a
    /// reset fetch.
    pub fn set_filters(&mut self, next: ArticleFilters) -> bool {
        let reset = !self.filters.same_selection(&next);
        self.filters = next;
        if reset {
            self.filters.page = 1;
        }
        reset
    }

    pub fn update_filters(&mut self, update: impl FnOnce(&mut ArticleFilters)) -> bool {
        let mut next = self.filters.clone();
        update(&mut next);
        self.set_filters(next)
    }

    pub fn set_category(&mut self, category_name: impl Into<String>) -> bool {
        let category_name = category_name.into();
        self.update_filters(|filters| filters.category_name = category_name)
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> bool {
        self.update_filters(|filters| filters.sort = sort)
    }

    /// Free-text search keystrokes; applied once they settle.
    pub fn type_search(&mut self, text: impl Into<String>) {
        self.search_input.push(text.into());
    }

    /// Exact-title keystrokes; applied once they settle.
    pub fn type_title(&mut self, text: impl Into<String>) {
        self.title_input.push(text.into());
    }

    /// Moves settled inputs into the filters. Returns `true` when that
    /// changed the selection.
    pub fn apply_settled_inputs(&mut self) -> bool {
        let search = self.search_input.take_settled();
        let title = self.title_input.take_settled();
        self.apply_inputs(search, title)
    }

    /// Waits for pending inputs to settle, then applies them.
    pub async fn settle_inputs(&mut self) -> bool {
        let search = self.search_input.settled().await;
        let title = self.title_input.settled().await;
        self.apply_inputs(search, title)
    }

    fn apply_inputs(&mut self, search: Option<String>, title: Option<String>) -> bool {
        if search.is_none() && title.is_none() {
            return false;
        }
        self.update_filters(|filters| {
            if let Some(search) = search {
                filters.search = search;
            }
            if let Some(title) = title {
                filters.title_exact = title;
            }
        })
    }

    /// The end-of-list sentinel came into view. Advances the page when
    /// there is one to load and nothing is loading.
    pub fn request_next_page(&mut self) -> bool {
        if self.state.is_loading || !self.has_more() {
            return false;
        }
        self.filters.page = self.state.current_page + 1;
        true
    }

    pub fn begin_fetch(&mut self, reset: bool) -> Option<FetchTicket> {
        if self.state.is_loading && !reset {
            debug!("article fetch already in flight, skipping page {}", self.filters.page);
            return None;
        }

        if reset {
            self.filters.page = 1;
        }

        self.generation += 1;
        self.state.is_loading = true;
        self.state.error = None;

        let page = self.filters.page;
        debug!(
            "fetching articles page {} (generation {}, reset: {})",
            page, self.generation, reset
        );

        Some(FetchTicket {
            generation: self.generation,
            page,
            reset,
            query: self.filters.query(page),
        })
    }

    /// Applies a response. Returns `false` when the ticket was superseded
    /// and the response was dropped.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<ListResponse<Article>, ApiError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "discarding articles for generation {} (current {})",
                ticket.generation, self.generation
            );
            return false;
        }

        self.state.is_loading = false;

        match outcome {
            Ok(response) => {
                let pagination = response.pagination();
                let page = pagination
                    .map(|p| p.page)
                    .filter(|page| *page > 0)
                    .unwrap_or(ticket.page);
                let total_pages = match pagination {
                    Some(pagination) => pagination.page_count,
                    None if !response.data.is_empty() => ticket.page,
                    None => self.state.total_pages,
                };

                if ticket.reset {
                    self.state.articles = response.data;
                } else {
                    self.state.articles.extend(response.data);
                }
                self.state.current_page = page;
                self.state.total_pages = total_pages;
                self.state.error = None;
                self.filters.page = page;
            }
            Err(e) => {
                warn!("failed to fetch articles page {}: {}", ticket.page, e);
                self.state.error = Some(e.to_string());
                if !ticket.reset {
                    // The failed page is fetched again by the next request.
                    self.filters.page = self.state.current_page;
                }
            }
        }

        true
    }

    pub async fn fetch(&mut self, api: &dyn ContentApi, reset: bool) -> bool {
        let Some(ticket) = self.begin_fetch(reset) else {
            return false;
        };
        let outcome = api.list_articles(ticket.query()).await;
        self.finish_fetch(ticket, outcome)
    }

    pub async fn refresh(&mut self, api: &dyn ContentApi) -> bool {
        self.fetch(api, true).await
    }

    pub async fn load_more(&mut self, api: &dyn ContentApi) -> bool {
        if !self.request_next_page() {
            return false;
        }
        self.fetch(api, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Category, MockContentApi, Pagination};
    use std::time::Duration;

    fn article(id: u64, title: &str) -> Article {
        Article {
            id,
            document_id: format!("doc-{id}"),
            title: title.to_string(),
            description: String::new(),
            cover_image_url: None,
            category: None,
            created_at: None,
            updated_at: None,
            published_at: None,
            locale: None,
            user: None,
        }
    }

    fn page(titles: &[&str], page: u32, page_count: u32) -> ListResponse<Article> {
        let data = titles
            .iter()
            .enumerate()
            .map(|(i, title)| article(i as u64, title))
            .collect();
        ListResponse::new(
            data,
            Some(Pagination {
                page,
                page_size: 9,
                page_count,
                total: 0,
            }),
        )
    }

    fn titles(feed: &ArticleFeed) -> Vec<&str> {
        feed.articles().iter().map(|a| a.title.as_str()).collect()
    }

    fn seeded_api(count: usize) -> MockContentApi {
        let api = MockContentApi::new()
            .with_page_size(3)
            .with_categories(vec![Category::new(1, "Beach"), Category::new(2, "City")]);
        for i in 0..count {
            let category = if i % 2 == 0 { "Beach" } else { "City" };
            api.add_article(&format!("Trip {i:02}"), Some(category));
        }
        api
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut feed = ArticleFeed::new();
        feed.update_filters(|f| f.page = 4);
        assert_eq!(feed.filters().page, 4);

        assert!(feed.set_sort(SortOrder::TitleAscending));
        assert_eq!(feed.filters().page, 1);

        assert!(!feed.set_sort(SortOrder::TitleAscending));
        assert!(feed.set_category("Beach"));
    }

    #[test]
    fn test_reset_replaces_and_next_page_appends() {
        let mut feed = ArticleFeed::new();

        let ticket = feed.begin_fetch(true).unwrap();
        assert!(feed.state().is_loading);
        assert!(feed.finish_fetch(ticket, Ok(page(&["a", "b"], 1, 2))));
        assert_eq!(titles(&feed), ["a", "b"]);

        assert!(feed.request_next_page());
        let ticket = feed.begin_fetch(false).unwrap();
        assert_eq!(ticket.page(), 2);
        feed.finish_fetch(ticket, Ok(page(&["c"], 2, 2)));

        assert_eq!(titles(&feed), ["a", "b", "c"]);
        assert_eq!(feed.state().current_page, 2);
        assert!(!feed.has_more());
        assert!(!feed.request_next_page());
    }

    #[test]
    fn test_next_page_refused_while_loading() {
        let mut feed = ArticleFeed::new();
        let _ticket = feed.begin_fetch(true).unwrap();

        assert!(feed.begin_fetch(false).is_none());
        assert!(!feed.request_next_page());
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let mut feed = ArticleFeed::new();

        let stale = feed.begin_fetch(true).unwrap();
        feed.set_category("City");
        let fresh = feed.begin_fetch(true).unwrap();
        assert_eq!(fresh.query().category_name, "City");

        assert!(feed.finish_fetch(fresh, Ok(page(&["city walk"], 1, 1))));
        assert!(!feed.finish_fetch(stale, Ok(page(&["beach day"], 1, 1))));

        assert_eq!(titles(&feed), ["city walk"]);
        assert!(!feed.state().is_loading);
    }

    #[test]
    fn test_stale_response_does_not_end_loading() {
        let mut feed = ArticleFeed::new();

        let stale = feed.begin_fetch(true).unwrap();
        let _fresh = feed.begin_fetch(true).unwrap();

        feed.finish_fetch(stale, Ok(page(&["old"], 1, 1)));
        assert!(feed.state().is_loading);
        assert!(feed.articles().is_empty());
    }

    #[test]
    fn test_missing_pagination_fallbacks() {
        let mut feed = ArticleFeed::new();

        let ticket = feed.begin_fetch(true).unwrap();
        feed.finish_fetch(
            ticket,
            Ok(ListResponse {
                data: vec![article(1, "x")],
                meta: None,
            }),
        );
        assert_eq!(feed.state().current_page, 1);
        assert_eq!(feed.state().total_pages, 1);

        let ticket = feed.begin_fetch(true).unwrap();
        feed.finish_fetch(
            ticket,
            Ok(ListResponse {
                data: vec![],
                meta: None,
            }),
        );
        assert_eq!(feed.state().total_pages, 1);
        assert!(feed.articles().is_empty());
    }

    #[test]
    fn test_failure_keeps_list_and_rewinds_page() {
        let mut feed = ArticleFeed::new();
        let ticket = feed.begin_fetch(true).unwrap();
        feed.finish_fetch(ticket, Ok(page(&["a"], 1, 3)));

        feed.request_next_page();
        let ticket = feed.begin_fetch(false).unwrap();
        feed.finish_fetch(ticket, Err(ApiError::from_response(500, b"")));

        assert_eq!(titles(&feed), ["a"]);
        assert_eq!(feed.filters().page, 1);
        assert!(feed.state().error.as_deref().unwrap().contains("server"));
        assert!(!feed.state().is_loading);

        assert!(feed.request_next_page());
        assert_eq!(feed.filters().page, 2);
    }

    #[tokio::test]
    async fn test_infinite_scroll_against_api() {
        let api = seeded_api(7);
        let mut feed = ArticleFeed::with_filters(ArticleFilters {
            sort: SortOrder::TitleAscending,
            ..ArticleFilters::default()
        });

        assert!(feed.refresh(&api).await);
        assert_eq!(titles(&feed), ["Trip 00", "Trip 01", "Trip 02"]);
        assert_eq!(feed.state().total_pages, 3);

        while feed.load_more(&api).await {}

        assert_eq!(feed.articles().len(), 7);
        assert_eq!(feed.state().current_page, 3);
        assert_eq!(api.calls("list_articles"), 3);
    }

    #[tokio::test]
    async fn test_category_filter_against_api() {
        let api = seeded_api(6);
        let mut feed = ArticleFeed::new();

        feed.refresh(&api).await;
        assert!(feed.set_category("City"));
        feed.refresh(&api).await;

        assert_eq!(feed.articles().len(), 3);
        assert!(feed.articles().iter().all(|a| a.category_name() == "City"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search() {
        let api = seeded_api(4);
        let mut feed = ArticleFeed::new();

        feed.type_search("tri");
        feed.type_search("trip 0");
        feed.type_search("trip 03");
        assert!(!feed.apply_settled_inputs());
        assert_eq!(feed.filters().search, "");

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(feed.apply_settled_inputs());
        assert_eq!(feed.filters().search, "trip 03");

        feed.refresh(&api).await;
        assert_eq!(titles(&feed), ["Trip 03"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_input_equal_to_current_filter_is_noop() {
        let mut feed = ArticleFeed::new();
        feed.type_title("Ubud");
        assert!(feed.settle_inputs().await);

        feed.type_title("Ubu");
        feed.type_title("Ubud");
        assert!(!feed.settle_inputs().await);
        assert_eq!(feed.filters().title_exact, "Ubud");
    }
}
