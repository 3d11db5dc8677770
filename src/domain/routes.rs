//! Client routes and the strategy deep-link contract.

use url::Url;

use crate::domain::error::StratifyError;

pub const LOGIN_PATH: &str = "/login";
pub const PORTAL_PATH: &str = "/portal";
pub const DASHBOARD_PATH: &str = "/dashboard";

const EXECUTION_PARAM: &str = "execution";

/// A strategy view, optionally with one execution selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyLink {
    pub strategy_id: u64,
    pub execution_id: Option<u64>,
}

impl StrategyLink {
    pub fn new(strategy_id: u64) -> Self {
        Self {
            strategy_id,
            execution_id: None,
        }
    }

    pub fn with_execution(mut self, execution_id: u64) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    /// `/strategy/{id}` or `/strategy/{id}?execution={execution_id}`.
    pub fn to_path(&self) -> String {
        match self.execution_id {
            Some(execution) => format!(
                "/strategy/{}?{EXECUTION_PARAM}={execution}",
                self.strategy_id
            ),
            None => format!("/strategy/{}", self.strategy_id),
        }
    }

    /// Accepts a path or an absolute URL.
    pub fn parse(link: &str) -> Result<Self, StratifyError> {
        let invalid = |reason: &str| StratifyError::validation("link", format!("{reason}: {link}"));
        let base = Url::parse("http://localhost/").map_err(|e| invalid(&e.to_string()))?;
        let url = base.join(link).map_err(|e| invalid(&e.to_string()))?;

        let mut segments = url
            .path_segments()
            .ok_or_else(|| invalid("not a strategy link"))?
            .filter(|s| !s.is_empty());
        let (Some("strategy"), Some(id), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(invalid("not a strategy link"));
        };
        let strategy_id = id.parse().map_err(|_| invalid("bad strategy id"))?;

        let execution_id = url
            .query_pairs()
            .find(|(k, _)| k == EXECUTION_PARAM)
            .map(|(_, v)| v.parse::<u64>().map_err(|_| invalid("bad execution id")))
            .transpose()?;
        Ok(Self {
            strategy_id,
            execution_id,
        })
    }
}

impl std::fmt::Display for StrategyLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_path())
    }
}
