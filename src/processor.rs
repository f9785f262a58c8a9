//! Page-at-a-time evaluation.
//!
//! A [`PageProcessor`] runs an optional filter and a list of projections over
//! an input [`Page`], producing output pages of at most `max_batch_size`
//! positions. Processors hold no mutable state and can be shared by worker
//! threads, each processing its own pages.

mod filter;
mod projection;

pub use filter::PageFilter;
pub use projection::PageProjection;

use crate::block::{Block, Page};
use crate::error::EvalResult;

#[derive(Debug, Clone)]
pub struct PageProcessor {
    filter: Option<PageFilter>,
    projections: Vec<PageProjection>,
    max_batch_size: usize,
}

impl PageProcessor {
    pub fn new(
        filter: Option<PageFilter>,
        projections: Vec<PageProjection>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            filter,
            projections,
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn projections(&self) -> &[PageProjection] {
        &self.projections
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Process one input page. A page with no selected positions yields no
    /// output pages.
    pub fn process(&self, page: &Page) -> EvalResult<Vec<Page>> {
        let positions = match &self.filter {
            Some(filter) => filter.filter(page)?,
            None => (0..page.position_count()).collect(),
        };

        let mut output = Vec::new();
        for batch in positions.chunks(self.max_batch_size) {
            if self.projections.is_empty() {
                output.push(Page::with_position_count(batch.len()));
                continue;
            }
            let blocks = self
                .projections
                .iter()
                .map(|projection| projection.project(page, batch))
                .collect::<EvalResult<Vec<Block>>>()?;
            output.push(Page::from_parts(blocks, batch.len()));
        }
        Ok(output)
    }
}
