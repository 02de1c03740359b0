use crate::types::Stargazer;

/// Outcome of fetching a single stargazer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarPage {
    /// A non-empty page of stars.
    Stars(Vec<Stargazer>),
    /// The API returned an empty page: pagination reached its end.
    End,
}

impl StarPage {
    pub fn into_stars(self) -> Vec<Stargazer> {
        match self {
            StarPage::Stars(stars) => stars,
            StarPage::End => Vec::new(),
        }
    }
}

/// Limits applied when collecting every page of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// GitHub refuses to enumerate stargazers past this many pages.
    pub max_pages: u32,
    /// Page requests allowed in flight at once.
    pub max_concurrency: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_pages: 400,
            max_concurrency: 4,
        }
    }
}
