//! Strategy listing, creation and the portfolio dashboard.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::error::StratifyError;
use crate::domain::execution::{DashboardStats, RecentTrade};
use crate::domain::routes::StrategyLink;
use crate::domain::strategy::{Page, Strategy, StrategyFilter};
use crate::ports::api_port::{DashboardQuery, StratifyApi};
use crate::ports::navigation_port::Navigator;
use crate::ports::notify_port::{Notifier, reported};

pub struct StrategyBrowser {
    api: Arc<dyn StratifyApi>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    filter: StrategyFilter,
    page: Option<Page<Strategy>>,
}

impl StrategyBrowser {
    pub fn new(api: Arc<dyn StratifyApi>, notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            notifier,
            navigator,
            filter: StrategyFilter::default(),
            page: None,
        }
    }

    pub fn filter(&self) -> &StrategyFilter {
        &self.filter
    }

    pub fn page(&self) -> Option<&Page<Strategy>> {
        self.page.as_ref()
    }

    /// Runs `filter` from its first page.
    pub async fn search(&mut self, filter: StrategyFilter) -> Result<&Page<Strategy>, StratifyError> {
        let filter = StrategyFilter { page: 1, ..filter };
        self.fetch(filter).await
    }

    pub async fn next_page(&mut self) -> Result<Option<&Page<Strategy>>, StratifyError> {
        let current = self.filter.page.max(1);
        let more = self.page.as_ref().is_some_and(|p| p.has_more(current));
        if !more {
            return Ok(None);
        }
        let filter = StrategyFilter {
            page: current + 1,
            ..self.filter.clone()
        };
        self.fetch(filter).await.map(Some)
    }

    pub async fn previous_page(&mut self) -> Result<Option<&Page<Strategy>>, StratifyError> {
        let current = self.filter.page.max(1);
        if current == 1 {
            return Ok(None);
        }
        let filter = StrategyFilter {
            page: current - 1,
            ..self.filter.clone()
        };
        self.fetch(filter).await.map(Some)
    }

    /// Creates an empty draft and opens it.
    pub async fn create_strategy(&self) -> Result<Strategy, StratifyError> {
        let reply = self.api.create_strategy().await;
        let strategy = reported(self.notifier.as_ref(), "Failed to create strategy", reply)?;
        self.navigator
            .navigate(&StrategyLink::new(strategy.id).to_path());
        Ok(strategy)
    }

    async fn fetch(&mut self, filter: StrategyFilter) -> Result<&Page<Strategy>, StratifyError> {
        let reply = self.api.strategies(&filter).await;
        let page = reported(self.notifier.as_ref(), "Failed to get strategies", reply)?;
        tracing::debug!(page = filter.page, count = page.count, "strategies listed");
        self.filter = filter;
        Ok(self.page.insert(page))
    }
}

impl RecentTrade {
    pub fn link(&self) -> StrategyLink {
        StrategyLink::new(self.strategy_id).with_execution(self.strategy_execution_id)
    }
}

/// Dashboard statistics for a date range.
pub async fn load_dashboard(
    api: &dyn StratifyApi,
    notifier: &dyn Notifier,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    real_trading: bool,
) -> Result<DashboardStats, StratifyError> {
    let mut query = DashboardQuery::last_week(Utc::now(), real_trading);
    if let Some(end) = end {
        query.end = end;
        query.start = end - chrono::Duration::days(7);
    }
    if let Some(start) = start {
        query.start = start;
    }
    if query.start >= query.end {
        return Err(StratifyError::validation("start", "Start date must be before end date"));
    }
    reported(notifier, "Failed to get dashboard", api.dashboard(&query).await)
}
