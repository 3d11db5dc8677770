//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::adapters::console::{ConsoleNotifier, RouteRecorder};
use crate::adapters::file_config_adapter::{EnvConfigAdapter, FileConfigAdapter, LayeredConfig};
use crate::adapters::headless_chart::HeadlessChart;
use crate::adapters::http_api::HttpApiAdapter;
use crate::adapters::trades_table::{TradesTable, performance_summary};
use crate::domain::chart::{CandleChart, ResultsChart};
use crate::domain::chart::theme::CssVariables;
use crate::domain::config::ClientConfig;
use crate::domain::error::StratifyError;
use crate::domain::execution::ExecutionType;
use crate::domain::explore::{StrategyBrowser, load_dashboard};
use crate::domain::format::{format_number, format_optional_percent};
use crate::domain::indicator::{IndicatorParam, catalog_short_names};
use crate::domain::order_condition::{OrderCondition, OrderConditionBuilder};
use crate::domain::polling::PollOutcome;
use crate::domain::session::SessionService;
use crate::domain::strategy::{Strategy, StrategyFilter, display_exchange};
use crate::domain::timezone::format_in_zone;
use crate::domain::user::AccountForm;
use crate::domain::wire::parse_timestamp_text;
use crate::domain::workspace::{StrategyChanges, StrategyWorkspace};
use crate::logging::init_logging;
use crate::ports::api_port::{ApiKey, StratifyApi};
use crate::ports::config_port::ConfigPort;

const SESSION_FILE: &str = "stratify-session";

#[derive(Parser, Debug)]
#[command(name = "stratify", about = "Trading strategy design and backtesting client")]
pub struct Cli {
    /// INI profile; STRATIFY_<SECTION>_<KEY> variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Where the session cookies are kept between runs
    #[arg(long, global = true, env = "STRATIFY_SESSION")]
    pub session: Option<PathBuf>,
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the signed-in user
    Whoami,
    /// Sign in with username and password
    Login {
        username: String,
        #[arg(long, env = "STRATIFY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with a Google ID token
    GoogleLogin { token: String },
    /// Sign in with a GitHub authorization code
    GithubLogin { code: String },
    /// Sign out
    Logout,
    /// Create an account; without --code, emails a verification code
    Signup {
        #[command(flatten)]
        account: AccountArgs,
        #[arg(long)]
        code: Option<String>,
    },
    /// Change email, username or password; without --code, emails a code
    UpdateAccount {
        #[command(flatten)]
        account: AccountArgs,
        #[arg(long)]
        code: Option<String>,
    },
    /// Delete the account; without --code, emails a code
    DeleteAccount {
        #[arg(long, env = "STRATIFY_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        code: Option<String>,
    },
    /// Reset a forgotten password; without --code, emails a code
    RecoverPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm: String,
        #[arg(long)]
        code: Option<String>,
    },
    /// Toggle between light and dark theme
    Theme,
    /// Set the display timezone (IANA name)
    Timezone { name: String },
    /// Browse and manage strategies
    Strategies {
        #[command(subcommand)]
        action: StrategyAction,
    },
    /// Manage a strategy's indicators
    Indicators {
        #[command(subcommand)]
        action: IndicatorAction,
    },
    /// Draw a strategy's chart as text
    Chart {
        strategy: u64,
        #[arg(long)]
        execution: Option<u64>,
    },
    /// Run and inspect strategy executions
    Executions {
        #[command(subcommand)]
        action: ExecutionAction,
    },
    /// Performance and trades of an execution
    Trades {
        strategy: u64,
        execution: u64,
        /// Write the trades table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Manage exchange API keys
    ApiKeys {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
    /// List supported exchanges
    Exchanges,
    /// List symbols on an exchange
    Symbols { exchange: String },
    /// Fees and leverage limits for a market
    Market { exchange: String, symbol: String },
    /// Portfolio statistics
    Dashboard {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Real trading instead of backtests; remembered on the account
        #[arg(long)]
        real: Option<bool>,
    },
    /// Format numbers the way prices are displayed
    Format {
        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Check an order-conditions JSON file
    Conditions { file: PathBuf },
}

#[derive(clap::Args, Debug)]
pub struct AccountArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "STRATIFY_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub confirm: String,
}

impl AccountArgs {
    fn form(&self) -> AccountForm {
        AccountForm {
            email: self.email.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum StrategyAction {
    /// List strategies matching a filter
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mine: bool,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Create an empty strategy
    Create,
    /// Show one strategy
    Show { id: u64 },
    /// Change strategy fields
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        public: Option<bool>,
    },
    /// Copy a strategy into your account
    Clone { id: u64 },
    /// Delete a strategy
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum IndicatorAction {
    /// Indicator types that can be added
    Catalog,
    /// Indicators of a strategy
    List { strategy: u64 },
    /// Add an indicator by short name (SMA, RSI, ...)
    Add { strategy: u64, short_name: String },
    /// Remove an indicator
    Remove { strategy: u64, id: String },
    /// Change parameters, given as key=value
    Update {
        strategy: u64,
        id: String,
        params: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExecutionAction {
    /// Executions of a strategy
    List { strategy: u64 },
    /// Start a run with the conditions in a JSON file
    Start {
        strategy: u64,
        #[arg(long)]
        conditions: PathBuf,
        #[arg(long)]
        initial_value: f64,
        #[arg(long)]
        leverage: Option<u32>,
        #[arg(long)]
        maker_fee: Option<f64>,
        #[arg(long)]
        taker_fee: Option<f64>,
        /// Trade with real funds
        #[arg(long)]
        real: bool,
        #[arg(long)]
        confirm_real: bool,
    },
    /// Stop a running execution
    Stop {
        strategy: u64,
        execution: u64,
        #[arg(long)]
        confirm_real: bool,
    },
    /// Delete an execution
    Delete { strategy: u64, execution: u64 },
    /// Poll an execution until it finishes
    Watch { strategy: u64, execution: u64 },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyAction {
    /// Exchanges with stored keys
    List,
    /// Store or update keys for an exchange
    Set {
        exchange: String,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        secret: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        uid: Option<String>,
    },
    /// Delete an exchange's keys
    Delete { exchange: String },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    match &cli.command {
        Command::Format { values } => return run_format(values),
        Command::Conditions { file } => return run_conditions(file),
        _ => {}
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let client = match Client::connect(config, cli.session) {
        Ok(c) => c,
        Err(e) => return report(&e),
    };
    let result = client.runtime.block_on(client.dispatch(cli.command));
    client.persist_session();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(err: &StratifyError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Layers `STRATIFY_*` variables over the optional INI profile.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ExitCode> {
    let mut layered = LayeredConfig::new().with_layer(EnvConfigAdapter::from_env());
    if let Some(path) = path {
        eprintln!("Loading config from {}", path.display());
        let file = FileConfigAdapter::from_file(path).map_err(|e| {
            report(&StratifyError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        layered = layered.with_layer(file);
    }
    client_config(&layered).map_err(|e| report(&e))
}

pub fn client_config(config: &dyn ConfigPort) -> Result<ClientConfig, StratifyError> {
    ClientConfig::from_port(config)
}

/// `2024-01-31`, `2024-01-31T12:00` or RFC 3339.
pub fn parse_date_arg(field: &str, value: &str) -> Result<DateTime<Utc>, StratifyError> {
    let trimmed = value.trim();
    let text = if trimmed.len() == 10 {
        format!("{trimmed} 00:00")
    } else {
        trimmed.to_string()
    };
    parse_timestamp_text(&text).ok_or_else(|| {
        StratifyError::validation(field, format!("invalid date {value}, expected YYYY-MM-DD"))
    })
}

/// `timeperiod=14` pairs applied over `current`, keeping key order.
pub fn parse_params(current: &[IndicatorParam], pairs: &[String]) -> Result<Vec<IndicatorParam>, StratifyError> {
    let mut params = current.to_vec();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| StratifyError::validation("params", format!("expected key=value, got {pair}")))?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| StratifyError::validation("params", format!("{key}: not a number")))?;
        match params.iter_mut().find(|p| p.key == key.trim()) {
            Some(p) => p.value = value,
            None => {
                return Err(StratifyError::validation(
                    "params",
                    format!("unknown parameter {key}"),
                ));
            }
        }
    }
    Ok(params)
}

fn run_format(values: &[f64]) -> ExitCode {
    for v in values {
        println!("{}", format_number(*v));
    }
    ExitCode::SUCCESS
}

fn run_conditions(path: &Path) -> ExitCode {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => return report(&StratifyError::Io(e)),
    };
    let blocks: Vec<OrderCondition> = match serde_json::from_str(&text) {
        Ok(b) => b,
        Err(e) => return report(&e.into()),
    };
    let mut problems = 0;
    for (i, block) in blocks.iter().enumerate() {
        println!("#{} {}", i + 1, block.to_expression());
        let found = block.problems();
        for problem in &found {
            println!("  ! {problem}");
        }
        problems += found.len();
    }
    if problems > 0 {
        eprintln!("{problems} problem(s) found");
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

struct Client {
    runtime: Runtime,
    http: Arc<HttpApiAdapter>,
    api: Arc<dyn StratifyApi>,
    notifier: Arc<ConsoleNotifier>,
    navigator: Arc<RouteRecorder>,
    config: ClientConfig,
    session_path: PathBuf,
}

impl Client {
    fn connect(config: ClientConfig, session_path: Option<PathBuf>) -> Result<Self, StratifyError> {
        let runtime = Runtime::new()?;
        let navigator = Arc::new(RouteRecorder::new());
        let http = Arc::new(HttpApiAdapter::from_config(&config, navigator.clone())?);
        let session_path = session_path.unwrap_or_else(|| std::env::temp_dir().join(SESSION_FILE));
        if let Ok(cookies) = fs::read_to_string(&session_path) {
            http.restore_session(cookies.trim());
        }
        Ok(Self {
            runtime,
            api: http.clone(),
            http,
            notifier: Arc::new(ConsoleNotifier),
            navigator,
            config,
            session_path,
        })
    }

    /// Keeps cookies for the next run; a redirect to login drops them.
    fn persist_session(&self) {
        let expired = self.navigator.last().as_deref() == Some(crate::domain::routes::LOGIN_PATH);
        let outcome = match self.http.session_cookies() {
            Some(cookies) if !expired => fs::write(&self.session_path, cookies),
            _ if self.session_path.exists() => fs::remove_file(&self.session_path),
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            tracing::warn!(path = %self.session_path.display(), error = %e, "could not store session");
        }
    }

    fn sessions(&self) -> SessionService {
        SessionService::new(
            self.api.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
            self.config.theme,
        )
        .with_local_timezone(self.config.timezone.name())
    }

    /// Session service after checking the stored cookies.
    async fn signed_in(&self) -> Result<SessionService, StratifyError> {
        let mut session = self.sessions();
        session.init().await?;
        Ok(session)
    }

    async fn require_user(&self) -> Result<SessionService, StratifyError> {
        let session = self.signed_in().await?;
        if session.session().user().is_none() {
            return Err(StratifyError::Unauthorized);
        }
        Ok(session)
    }

    async fn workspace(&self, strategy: u64) -> Result<StrategyWorkspace<HeadlessChart>, StratifyError> {
        let session = self.signed_in().await?;
        let tz = match session.session().user() {
            Some(_) => session.session().timezone(),
            None => self.config.timezone,
        };
        let mut chart = CandleChart::new(HeadlessChart::new(), self.notifier.clone(), tz);
        chart.apply_theme(&CssVariables::palette(session.session().theme()))?;
        eprintln!("Opening strategy {strategy}");
        let workspace = StrategyWorkspace::open(
            self.api.clone(),
            self.notifier.clone(),
            self.navigator.clone(),
            chart,
            strategy,
            session.session().user_id(),
        )
        .await?;
        Ok(workspace.with_poll_interval(self.config.poll_interval))
    }

    async fn dispatch(&self, command: Command) -> Result<(), StratifyError> {
        match command {
            Command::Whoami => {
                let session = self.signed_in().await?;
                match session.session().user() {
                    Some(user) => println!(
                        "{} <{}> theme={} timezone={}",
                        user.username,
                        user.email,
                        session.session().theme(),
                        session.session().timezone()
                    ),
                    None => println!("not signed in"),
                }
                Ok(())
            }
            Command::Login { username, password } => {
                let mut session = self.sessions();
                let user = session.login(&username, &password).await?;
                eprintln!("Signed in as {}", user.username);
                Ok(())
            }
            Command::GoogleLogin { token } => {
                let mut session = self.sessions();
                let user = session.google_login(&token).await?;
                eprintln!("Signed in as {}", user.username);
                Ok(())
            }
            Command::GithubLogin { code } => {
                let mut session = self.sessions();
                let user = session.github_login(&code).await?;
                eprintln!("Signed in as {}", user.username);
                Ok(())
            }
            Command::Logout => {
                self.sessions().logout().await;
                eprintln!("Signed out");
                Ok(())
            }
            Command::Signup { account, code } => {
                let mut session = self.sessions();
                match code {
                    None => {
                        session.request_signup_code(&account.form(), &account.confirm).await?;
                        eprintln!("Verification code sent to {}", account.email);
                    }
                    Some(code) => {
                        let user = session.signup(&account.form(), &account.confirm, &code).await?;
                        eprintln!("Account {} created", user.username);
                    }
                }
                Ok(())
            }
            Command::UpdateAccount { account, code } => {
                let mut session = self.require_user().await?;
                match code {
                    None => {
                        session
                            .request_account_update_code(&account.form(), &account.confirm)
                            .await?;
                        eprintln!("Verification code sent to {}", account.email);
                    }
                    Some(code) => {
                        session
                            .update_account(&account.form(), &account.confirm, &code)
                            .await?;
                    }
                }
                Ok(())
            }
            Command::DeleteAccount { password, code } => {
                let mut session = self.require_user().await?;
                match code {
                    None => {
                        session.request_delete_code(&password).await?;
                        eprintln!("Verification code sent");
                    }
                    Some(code) => {
                        session.delete_account(&password, &code).await?;
                        eprintln!("Account deleted");
                    }
                }
                Ok(())
            }
            Command::RecoverPassword {
                email,
                new_password,
                confirm,
                code,
            } => {
                let session = self.sessions();
                match code {
                    None => {
                        session
                            .request_password_recovery(&email, &new_password, &confirm)
                            .await?;
                        eprintln!("Verification code sent to {email}");
                    }
                    Some(code) => {
                        session
                            .recover_password(&email, &new_password, &confirm, &code)
                            .await?;
                    }
                }
                Ok(())
            }
            Command::Theme => {
                let mut session = self.signed_in().await?;
                let theme = session.toggle_theme().await?;
                println!("{theme}");
                Ok(())
            }
            Command::Timezone { name } => {
                let mut session = self.require_user().await?;
                let user = session.set_timezone(&name).await?;
                println!("{}", user.timezone);
                Ok(())
            }
            Command::Strategies { action } => self.strategies(action).await,
            Command::Indicators { action } => self.indicators(action).await,
            Command::Chart { strategy, execution } => {
                let mut ws = self.workspace(strategy).await?;
                if execution.is_some() {
                    ws.select_execution(execution)?;
                }
                print!("{}", ws.chart().surface().render());
                Ok(())
            }
            Command::Executions { action } => self.executions(action).await,
            Command::Trades {
                strategy,
                execution,
                csv,
            } => self.trades(strategy, execution, csv.as_deref()).await,
            Command::ApiKeys { action } => self.api_keys(action).await,
            Command::Exchanges => {
                for exchange in self.api.exchanges().await? {
                    println!("{exchange}\t{}", display_exchange(&exchange));
                }
                Ok(())
            }
            Command::Symbols { exchange } => {
                let symbols = self.api.symbols(&exchange).await?;
                eprintln!("{} symbols on {}", symbols.len(), display_exchange(&exchange));
                for symbol in symbols {
                    println!("{symbol}");
                }
                Ok(())
            }
            Command::Market { exchange, symbol } => {
                let info = self.api.market_info(&exchange, &symbol).await?;
                println!("{}", serde_json::to_string_pretty(&info)?);
                Ok(())
            }
            Command::Dashboard { start, end, real } => self.dashboard(start, end, real).await,
            Command::Format { .. } | Command::Conditions { .. } => Ok(()),
        }
    }

    async fn strategies(&self, action: StrategyAction) -> Result<(), StratifyError> {
        match action {
            StrategyAction::List {
                name,
                mine,
                exchange,
                symbol,
                page,
            } => {
                let session = self.signed_in().await?;
                let mut browser = StrategyBrowser::new(self.api.clone(), self.notifier.clone(), self.navigator.clone());
                let filter = StrategyFilter {
                    name,
                    only_mine: mine,
                    exchange,
                    symbol,
                    page,
                };
                browser.search(filter).await?;
                while browser.filter().page < page {
                    if browser.next_page().await?.is_none() {
                        break;
                    }
                }
                let Some(listed) = browser.page() else {
                    return Ok(());
                };
                let user = session.session().user_id();
                eprintln!(
                    "Page {} of {} ({} strategies)",
                    browser.filter().page,
                    listed.total_pages().max(1),
                    listed.count
                );
                for s in &listed.results {
                    print_strategy_line(s, user);
                }
                Ok(())
            }
            StrategyAction::Create => {
                self.require_user().await?;
                let browser = StrategyBrowser::new(self.api.clone(), self.notifier.clone(), self.navigator.clone());
                let strategy = browser.create_strategy().await?;
                println!("{}", strategy.id);
                Ok(())
            }
            StrategyAction::Show { id } => {
                let ws = self.workspace(id).await?;
                let s = ws.strategy();
                println!("{} {}", s.id, s.name);
                println!("market: {} {} {}", display_exchange(&s.exchange), s.symbol, s.timeframe);
                if let (Some(start), Some(end)) = (s.start_date, s.end_date) {
                    let tz = ws.chart().timezone();
                    println!("range: {} - {}", format_in_zone(start, &tz), format_in_zone(end, &tz));
                }
                println!("public: {}  clones: {}", s.is_public, s.clones_count);
                for indicator in &s.indicators {
                    println!("indicator {} {}", indicator.id, indicator.legend_label());
                }
                println!("link: {}", ws.link());
                Ok(())
            }
            StrategyAction::Update {
                id,
                name,
                exchange,
                symbol,
                timeframe,
                start,
                end,
                public,
            } => {
                let mut ws = self.workspace(id).await?;
                let changes = StrategyChanges {
                    name,
                    exchange,
                    symbol,
                    timeframe,
                    start_date: start.map(|s| parse_date_arg("start_date", &s)).transpose()?,
                    end_date: end.map(|s| parse_date_arg("end_date", &s)).transpose()?,
                    is_public: public,
                };
                ws.update_details(&changes).await?;
                eprintln!("Strategy {id} updated");
                Ok(())
            }
            StrategyAction::Clone { id } => {
                self.require_user().await?;
                let ws = self.workspace(id).await?;
                let copy = ws.clone_strategy().await?;
                println!("{}", copy.id);
                Ok(())
            }
            StrategyAction::Delete { id } => {
                let ws = self.workspace(id).await?;
                ws.delete_strategy().await?;
                eprintln!("Strategy {id} deleted");
                Ok(())
            }
        }
    }

    async fn indicators(&self, action: IndicatorAction) -> Result<(), StratifyError> {
        match action {
            IndicatorAction::Catalog => {
                for name in catalog_short_names() {
                    println!("{name}");
                }
                Ok(())
            }
            IndicatorAction::List { strategy } => {
                let ws = self.workspace(strategy).await?;
                for indicator in &ws.strategy().indicators {
                    let points = indicator.data.as_ref().map_or(0, Vec::len);
                    println!(
                        "{}\t{}\t{}\t{points} points\t{:?}",
                        indicator.id,
                        indicator.legend_label(),
                        indicator.operand_names().join(","),
                        ws.chart().state(&indicator.id)
                    );
                }
                Ok(())
            }
            IndicatorAction::Add { strategy, short_name } => {
                let mut ws = self.workspace(strategy).await?;
                let id = ws.add_indicator(&short_name.to_uppercase()).await?;
                println!("{id}");
                Ok(())
            }
            IndicatorAction::Remove { strategy, id } => {
                let mut ws = self.workspace(strategy).await?;
                ws.remove_indicator(&id).await?;
                eprintln!("Indicator {id} removed");
                Ok(())
            }
            IndicatorAction::Update { strategy, id, params } => {
                let mut ws = self.workspace(strategy).await?;
                let current = ws
                    .strategy()
                    .indicator(&id)
                    .map(|i| i.params.clone())
                    .ok_or_else(|| StratifyError::not_found("indicator", &id))?;
                let params = parse_params(&current, &params)?;
                if ws.update_indicator(&id, params).await? {
                    eprintln!("Indicator {id} updated");
                } else {
                    eprintln!("Indicator {id} unchanged");
                }
                Ok(())
            }
        }
    }

    async fn executions(&self, action: ExecutionAction) -> Result<(), StratifyError> {
        match action {
            ExecutionAction::List { strategy } => {
                let ws = self.workspace(strategy).await?;
                for execution in ws.executions() {
                    println!(
                        "{}\t{}",
                        execution.label(),
                        format_optional_percent(execution.metrics.rel_net_profit)
                    );
                }
                Ok(())
            }
            ExecutionAction::Start {
                strategy,
                conditions,
                initial_value,
                leverage,
                maker_fee,
                taker_fee,
                real,
                confirm_real,
            } => {
                let blocks: Vec<OrderCondition> = serde_json::from_str(&fs::read_to_string(&conditions)?)?;
                let mut ws = self.workspace(strategy).await?;
                *ws.builder_mut() = OrderConditionBuilder::new(blocks);
                let mut params = ws.market_params();
                if let (Some(maker), Some(taker)) = (maker_fee, taker_fee) {
                    params.set_fees(maker, taker)?;
                }
                params.set_initial_value(initial_value)?;
                if let Some(leverage) = leverage {
                    params.set_leverage(leverage)?;
                }
                if real {
                    params.set_execution_type(ExecutionType::Real)?;
                }
                let execution = ws.start_execution(&params, confirm_real).await?;
                eprintln!("Started {}", execution.label());
                println!("{}", execution.id);
                Ok(())
            }
            ExecutionAction::Stop {
                strategy,
                execution,
                confirm_real,
            } => {
                let mut ws = self.workspace(strategy).await?;
                ws.select_execution(Some(execution))?;
                let stopped = ws.stop_execution(confirm_real).await?;
                eprintln!("Stopped {}", stopped.label());
                Ok(())
            }
            ExecutionAction::Delete { strategy, execution } => {
                let mut ws = self.workspace(strategy).await?;
                ws.delete_execution(execution).await?;
                eprintln!("Execution {execution} deleted");
                Ok(())
            }
            ExecutionAction::Watch { strategy, execution } => {
                let mut ws = self.workspace(strategy).await?;
                ws.select_execution(Some(execution))?;
                eprintln!("Watching execution {execution}");
                match ws.follow_selected().await {
                    None | Some(PollOutcome::Finished(_)) => {
                        if let Some(done) = ws.selected_execution() {
                            println!(
                                "{}\t{}",
                                done.label(),
                                format_optional_percent(done.metrics.rel_net_profit)
                            );
                        }
                        Ok(())
                    }
                    Some(PollOutcome::Superseded) => Ok(()),
                    Some(PollOutcome::Failed(err)) => Err(err),
                }
            }
        }
    }

    async fn trades(&self, strategy: u64, execution: u64, csv: Option<&Path>) -> Result<(), StratifyError> {
        let mut ws = self.workspace(strategy).await?;
        ws.select_execution(Some(execution))?;
        let symbol = ws.strategy().symbol.clone();
        let tz = ws.chart().timezone();
        let Some(selected) = ws.selected_execution() else {
            return Err(StratifyError::not_found("execution", execution));
        };
        for (label, value) in performance_summary(&selected.metrics, &symbol) {
            println!("{label}: {value}");
        }
        let table = TradesTable::new(&selected.trades, &symbol, &tz);
        if csv.is_none() {
            let mut results = ResultsChart::new(HeadlessChart::new(), self.config.theme);
            results.set_trades(&selected.trades);
            print!("{}", results.surface().render());
        }
        match csv {
            Some(path) => {
                table.write_csv(fs::File::create(path)?)?;
                eprintln!("Wrote {} trades to {}", table.len(), path.display());
            }
            None => print!("{}", table.render()),
        }
        Ok(())
    }

    async fn api_keys(&self, action: ApiKeyAction) -> Result<(), StratifyError> {
        self.require_user().await?;
        match action {
            ApiKeyAction::List => {
                for exchange in self.api.api_key_exchanges().await? {
                    println!("{}", display_exchange(&exchange));
                }
            }
            ApiKeyAction::Set {
                exchange,
                api_key,
                secret,
                password,
                uid,
            } => {
                let key = ApiKey {
                    exchange: exchange.to_lowercase(),
                    api_key,
                    secret,
                    password,
                    uid,
                };
                key.validate()?;
                self.api.save_api_key(&key).await?;
                eprintln!("Keys saved for {}", display_exchange(&exchange));
            }
            ApiKeyAction::Delete { exchange } => {
                self.api.delete_api_key(&exchange.to_lowercase()).await?;
                eprintln!("Keys deleted for {}", display_exchange(&exchange));
            }
        }
        Ok(())
    }

    async fn dashboard(
        &self,
        start: Option<String>,
        end: Option<String>,
        real: Option<bool>,
    ) -> Result<(), StratifyError> {
        let mut session = self.require_user().await?;
        let remembered = session
            .session()
            .user()
            .is_some_and(|u| u.dashboard_real_trading);
        let real_trading = match real {
            Some(real) if real != remembered => {
                session.set_dashboard_real_trading(real).await?;
                real
            }
            Some(real) => real,
            None => remembered,
        };
        let start = start.map(|s| parse_date_arg("start", &s)).transpose()?;
        let end = end.map(|s| parse_date_arg("end", &s)).transpose()?;
        let stats = load_dashboard(self.api.as_ref(), self.notifier.as_ref(), start, end, real_trading).await?;
        let tz = session.session().timezone();

        let mode = if real_trading { "real trading" } else { "backtests" };
        println!("Dashboard ({mode})");
        println!(
            "Net profit: {}",
            format_optional_percent(stats.total_net_profit)
        );
        println!(
            "Closed trades: {}",
            stats.total_closed_trades.map_or_else(|| "-".to_string(), |n| n.to_string())
        );
        println!("Winning rate: {}", format_optional_percent(stats.winning_trade_rate));
        println!(
            "Profit factor: {}",
            stats.profit_factor.map_or_else(|| "-".to_string(), |f| format!("{f:.3}"))
        );
        println!("Avg trade profit: {}", format_optional_percent(stats.avg_trade_profit));
        for trade in &stats.recent_trades {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                format_in_zone(trade.timestamp, &tz),
                trade.strategy_name,
                trade.symbol,
                trade.side,
                format_optional_percent(trade.rel_profit),
                trade.link()
            );
        }
        Ok(())
    }
}

fn print_strategy_line(s: &Strategy, user: Option<u64>) {
    let owner = if s.is_owned_by(user) { "*" } else { " " };
    let visibility = if s.is_public { "public" } else { "private" };
    println!(
        "{owner}{}\t{}\t{}\t{}\t{}\t{visibility}\t{} clones",
        s.id,
        s.name,
        display_exchange(&s.exchange),
        s.symbol,
        s.timeframe,
        s.clones_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_args_accept_plain_dates() {
        let d = parse_date_arg("start", "2024-01-31").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-01-31T00:00:00+00:00");
        assert!(parse_date_arg("start", "31/01/2024").is_err());
    }

    #[test]
    fn params_override_by_key() {
        let current = vec![IndicatorParam::new("timeperiod", 14.0), IndicatorParam::new("upper_limit", 70.0)];
        let params = parse_params(&current, &["upper_limit=80".to_string()]).unwrap();
        assert_eq!(params[0].value, 14.0);
        assert_eq!(params[1].value, 80.0);
        assert!(parse_params(&current, &["nope=1".to_string()]).is_err());
        assert!(parse_params(&current, &["timeperiod".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from(["stratify", "indicators", "add", "7", "rsi"]).unwrap();
        match cli.command {
            Command::Indicators {
                action: IndicatorAction::Add { strategy, short_name },
            } => {
                assert_eq!(strategy, 7);
                assert_eq!(short_name, "rsi");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
