//! Catalog loading and incremental reveal of the loaded list

use rand::Rng;

use crate::api::CatalogSource;
use crate::models::{CatalogItem, ContentKind};

/// Page size of the home view rows
pub const HOME_PAGE_SIZE: usize = 16;
/// Page size of the dedicated movie and series views
pub const VIEW_PAGE_SIZE: usize = 24;
/// Distance from the end of the content that triggers the next page (points)
pub const SCROLL_THRESHOLD: f32 = 300.0;
/// The featured banner picks among this many leading movies
const FEATURED_POOL: usize = 20;

/// Full fetched list plus the prefix currently on screen
#[derive(Debug, Clone, Default)]
pub struct CatalogWindow {
    items: Vec<CatalogItem>,
    page_size: usize,
    pages: usize,
    pending: bool,
}

impl CatalogWindow {
    pub fn new(items: Vec<CatalogItem>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            pages: 1,
            pending: false,
        }
    }

    pub fn empty(page_size: usize) -> Self {
        Self::new(Vec::new(), page_size)
    }

    pub fn displayed(&self) -> &[CatalogItem] {
        &self.items[..self.displayed_len()]
    }

    pub fn displayed_len(&self) -> usize {
        self.pages.saturating_mul(self.page_size).min(self.items.len())
    }

    pub fn all(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.displayed_len() >= self.items.len()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Start a delayed page load. Returns false when nothing should happen:
    /// a load is already in flight or every item is already shown.
    pub fn begin_load_more(&mut self) -> bool {
        if self.pending || self.is_exhausted() {
            return false;
        }
        self.pending = true;
        true
    }

    /// Finish the load started by [`begin_load_more`](Self::begin_load_more)
    pub fn complete_load_more(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;
        if !self.is_exhausted() {
            self.pages += 1;
        }
    }

    /// Reveal the next page right away
    pub fn load_more(&mut self) {
        if self.begin_load_more() {
            self.complete_load_more();
        }
    }

    pub fn find(&self, id: i64) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Random pick among the first few items, for the home banner
    pub fn featured<R: Rng>(&self, rng: &mut R) -> Option<&CatalogItem> {
        let pool = self.items.len().min(FEATURED_POOL);
        if pool == 0 {
            return None;
        }
        self.items.get(rng.gen_range(0..pool))
    }
}

/// Fetch a whole catalog. Failures are logged and leave an empty window, which
/// the views render as their "no items" state.
pub fn load(source: &dyn CatalogSource, kind: ContentKind, page_size: usize) -> CatalogWindow {
    match source.list(kind) {
        Ok(items) => {
            log::info!("loaded {} {} entries", items.len(), kind);
            CatalogWindow::new(items, page_size)
        }
        Err(e) => {
            log::warn!("failed to load {} catalog: {}", kind, e);
            CatalogWindow::empty(page_size)
        }
    }
}

/// True when the bottom of the viewport is within `threshold` of the end of
/// the content
pub fn should_load_more(viewport_bottom: f32, content_height: f32, threshold: f32) -> bool {
    viewport_bottom >= content_height - threshold
}
