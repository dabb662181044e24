//! Search: fill the feeds of all configured sources

use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_dataset::SearchSourceSettings;
use colrev_state::Operation;
use tracing::{info, warn};

/// Search operation
#[derive(Debug)]
pub struct Search<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> Search<'a> {
    /// Search operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Run every source; a rerun refreshes records already retrieved
    ///
    /// Sources are searched one after another. Records retrieved again
    /// update the main records through their origins.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a feed cannot be read or written, or a
    /// source fails.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub async fn main(&self, rerun: bool) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Search)?;
        let dataset = rm.dataset();
        let mut message = CommitMessage::new(Operation::Search);

        for source in &rm.settings().sources {
            let plugin = rm.sources().for_settings(source);
            let resolved = SearchSourceSettings {
                filename: dataset.feed_path(source),
                ..source.clone()
            };
            let feed = dataset.search_feed(source, plugin.source_identifier(), rerun, false)?;
            plugin.search(&resolved, &feed, rerun).await?;
            let summary = dataset.save_feed(feed)?;
            if summary.added == 0 && summary.updated == 0 {
                info!(source = %source.filename.display(), "up-to-date");
            } else {
                info!(source = %source.filename.display(), "Retrieved {} records", summary.added);
            }
            if summary.updated > 0 {
                info!("Updated {} records", summary.updated);
            }
            message.add_stat("retrieved", summary.added);
            message.add_stat("updated", summary.updated);
        }
        if rm.settings().sources.is_empty() {
            warn!("no search sources configured");
        }

        rm.create_commit(&message)?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use async_trait::async_trait;
    use colrev_dataset::{
        DatasetError, Dataset, MemoryHistory, ProjectPaths, SearchFeed, SearchSource, SearchType, Settings,
        SourceRegistry,
    };
    use colrev_record::{fields, EntryType, Record};
    use std::path::Path;

    struct StaticApi;

    #[async_trait]
    impl SearchSource for StaticApi {
        fn endpoint(&self) -> &str {
            "test.static_api"
        }

        fn source_identifier(&self) -> &str {
            fields::DOI
        }

        fn heuristic(&self, _filename: &Path, _content: &str) -> f64 {
            0.0
        }

        async fn search(
            &self,
            _settings: &SearchSourceSettings,
            feed: &SearchFeed,
            _rerun: bool,
        ) -> std::result::Result<(), DatasetError> {
            for (doi, title) in [("10.1/a", "First paper"), ("10.1/b", "Second paper")] {
                let mut record = Record::new("", EntryType::Article)
                    .with_field(fields::DOI, doi)
                    .with_field(fields::TITLE, title);
                feed.add_update_record(&mut record)?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn search_fills_feed_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().with_source(SearchSourceSettings::new(
            "test.static_api",
            "api.bib",
            SearchType::Api,
        ));
        let dataset = Dataset::new(
            ProjectPaths::new(dir.path()),
            Box::new(MemoryHistory::new(dir.path())),
        );
        let mut sources = SourceRegistry::with_defaults();
        sources.register(StaticApi);
        let rm = ReviewManager::new(settings, dataset)
            .unwrap()
            .with_sources(sources)
            .with_pool(WorkerPool::sequential().unwrap());

        let message = Search::new(&rm).main(false).await.unwrap();
        assert_eq!(message.stat("retrieved"), 2);
        assert!(rm.paths().feed_file("api.bib").is_file());

        let message = Search::new(&rm).main(true).await.unwrap();
        assert_eq!(message.stat("retrieved"), 0);
    }
}
