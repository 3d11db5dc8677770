//! Current user and theme for the lifetime of the client.
//!
//! [`SessionService`] owns the one [`Session`] and runs every flow that
//! changes it. Failed requests are reported through the notifier and leave
//! the session as it was.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::domain::error::StratifyError;
use crate::domain::routes::LOGIN_PATH;
use crate::domain::timezone::{DEFAULT_TIMEZONE, parse_timezone};
use crate::domain::user::{
    AccountForm, Theme, User, validate_email, validate_new_password, validate_verification_code,
};
use crate::ports::api_port::{LoginPreferences, StratifyApi, UserPreferences};
use crate::ports::navigation_port::Navigator;
use crate::ports::notify_port::{Notice, Notifier, reported};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: Option<User>,
    theme: Theme,
    os_theme: Theme,
}

impl Session {
    pub fn new(os_theme: Theme) -> Self {
        Self {
            user: None,
            theme: os_theme,
            os_theme,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The user's zone, UTC when signed out or when the stored name is unknown.
    pub fn timezone(&self) -> Tz {
        self.user
            .as_ref()
            .and_then(|u| parse_timezone(&u.timezone).ok())
            .unwrap_or(Tz::UTC)
    }

    fn set_user(&mut self, user: User) {
        self.theme = Theme::from_dark(user.dark_theme);
        self.user = Some(user);
    }

    fn clear(&mut self) {
        self.user = None;
        self.theme = self.os_theme;
    }

    fn set_os_theme(&mut self, theme: Theme) {
        self.os_theme = theme;
        if self.user.is_none() {
            self.theme = theme;
        }
    }
}

pub struct SessionService {
    api: Arc<dyn StratifyApi>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    session: Session,
    local_timezone: String,
}

impl SessionService {
    pub fn new(
        api: Arc<dyn StratifyApi>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        os_theme: Theme,
    ) -> Self {
        Self {
            api,
            navigator,
            notifier,
            session: Session::new(os_theme),
            local_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    /// Zone reported to the server when an OAuth login creates an account.
    pub fn with_local_timezone(mut self, timezone: &str) -> Self {
        self.local_timezone = timezone.to_string();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &Arc<dyn StratifyApi> {
        &self.api
    }

    /// Asks the server whether the session cookie is valid and loads the
    /// user when it is. Returns whether a user is signed in.
    pub async fn init(&mut self) -> Result<bool, StratifyError> {
        let authenticated = self.report("Failed to check session", self.api.check_auth().await)?;
        if !authenticated {
            tracing::debug!("no active session");
            self.session.clear();
            return Ok(false);
        }
        self.load_user().await?;
        Ok(true)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, StratifyError> {
        if username.trim().is_empty() {
            return Err(self.invalid(StratifyError::validation("username", "Enter your username")));
        }
        if password.is_empty() {
            return Err(self.invalid(StratifyError::validation("password", "Enter your password")));
        }
        let reply = self.api.login(username.trim(), password).await;
        self.report("Login failed", reply)?;
        self.load_user().await
    }

    pub async fn google_login(&mut self, token: &str) -> Result<&User, StratifyError> {
        let prefs = self.login_preferences();
        let reply = self.api.google_login(token, &prefs).await;
        self.report("Google login failed", reply)?;
        self.load_user().await
    }

    pub async fn github_login(&mut self, code: &str) -> Result<&User, StratifyError> {
        let prefs = self.login_preferences();
        let reply = self.api.github_login(code, &prefs).await;
        self.report("GitHub login failed", reply)?;
        self.load_user().await
    }

    /// Ends the session locally even when the server call fails.
    pub async fn logout(&mut self) {
        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "logout request failed");
        }
        self.expire();
    }

    /// Clears the session and returns to the login page.
    pub fn expire(&mut self) {
        self.session.clear();
        self.navigator.navigate(LOGIN_PATH);
    }

    pub async fn request_signup_code(
        &self,
        form: &AccountForm,
        confirmation: &str,
    ) -> Result<(), StratifyError> {
        self.check_account_form(form, confirmation)?;
        let reply = self.api.send_signup_code(form).await;
        self.report("Failed to send code", reply)
    }

    pub async fn signup(
        &mut self,
        form: &AccountForm,
        confirmation: &str,
        code: &str,
    ) -> Result<&User, StratifyError> {
        self.check_account_form(form, confirmation)?;
        self.check_code(code)?;
        let reply = self.api.signup(form, code.trim()).await;
        let user = self.report("Signup failed", reply)?;
        self.session.set_user(user);
        self.current()
    }

    pub async fn request_account_update_code(
        &self,
        form: &AccountForm,
        confirmation: &str,
    ) -> Result<(), StratifyError> {
        self.check_account_form(form, confirmation)?;
        let reply = self.api.send_update_account_code(form).await;
        self.report("Failed to send code", reply)
    }

    pub async fn update_account(
        &mut self,
        form: &AccountForm,
        confirmation: &str,
        code: &str,
    ) -> Result<&User, StratifyError> {
        self.check_account_form(form, confirmation)?;
        self.check_code(code)?;
        let reply = self.api.update_account(form, code.trim()).await;
        let user = self.report("Failed to update account", reply)?;
        self.notifier.notify(Notice::new("Account updated"));
        self.session.set_user(user);
        self.current()
    }

    pub async fn request_delete_code(&self, password: &str) -> Result<(), StratifyError> {
        let reply = self.api.send_delete_account_code(password).await;
        self.report("Failed to send code", reply)
    }

    pub async fn delete_account(&mut self, password: &str, code: &str) -> Result<(), StratifyError> {
        self.check_code(code)?;
        let reply = self.api.delete_account(password, code.trim()).await;
        self.report("Failed to delete account", reply)?;
        self.expire();
        Ok(())
    }

    pub async fn request_password_recovery(
        &self,
        email: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), StratifyError> {
        self.check_recovery(email, new_password, confirmation)?;
        let reply = self.api.send_recover_password_code(email.trim(), new_password).await;
        self.report("Failed to send code", reply)
    }

    pub async fn recover_password(
        &self,
        email: &str,
        new_password: &str,
        confirmation: &str,
        code: &str,
    ) -> Result<(), StratifyError> {
        self.check_recovery(email, new_password, confirmation)?;
        self.check_code(code)?;
        let reply = self
            .api
            .recover_password(email.trim(), new_password, code.trim())
            .await;
        self.report("Failed to recover password", reply)?;
        self.notifier.notify(Notice::new("Password updated"));
        self.navigator.navigate(LOGIN_PATH);
        Ok(())
    }

    /// Flips the theme. Signed in, the server stores the preference and its
    /// answer wins; signed out, only the local theme changes.
    pub async fn toggle_theme(&mut self) -> Result<Theme, StratifyError> {
        if self.session.user.is_none() {
            self.session.theme = self.session.theme.toggled();
            return Ok(self.session.theme);
        }
        let reply = self.api.toggle_theme().await;
        let dark = self.report("Failed to change theme", reply)?;
        if let Some(user) = self.session.user.as_mut() {
            user.dark_theme = dark;
        }
        self.session.theme = Theme::from_dark(dark);
        Ok(self.session.theme)
    }

    /// The OS color scheme changed; followed only while signed out.
    pub fn set_os_theme(&mut self, theme: Theme) {
        self.session.set_os_theme(theme);
    }

    pub async fn set_timezone(&mut self, timezone: &str) -> Result<&User, StratifyError> {
        let tz = parse_timezone(timezone).map_err(|e| self.invalid(e))?;
        let prefs = UserPreferences {
            timezone: Some(tz.name().to_string()),
            ..UserPreferences::default()
        };
        self.update_preferences(prefs).await
    }

    pub async fn set_dashboard_real_trading(&mut self, real: bool) -> Result<&User, StratifyError> {
        let prefs = UserPreferences {
            dashboard_real_trading: Some(real),
            ..UserPreferences::default()
        };
        self.update_preferences(prefs).await
    }

    async fn update_preferences(&mut self, prefs: UserPreferences) -> Result<&User, StratifyError> {
        let reply = self.api.update_preferences(&prefs).await;
        let user = self.report("Failed to save preferences", reply)?;
        self.session.set_user(user);
        self.current()
    }

    async fn load_user(&mut self) -> Result<&User, StratifyError> {
        let reply = self.api.current_user().await;
        let user = self.report("Failed to load user", reply)?;
        tracing::info!(user_id = user.id, username = %user.username, "session started");
        self.session.set_user(user);
        self.current()
    }

    fn current(&self) -> Result<&User, StratifyError> {
        self.session.user().ok_or(StratifyError::Unauthorized)
    }

    fn login_preferences(&self) -> LoginPreferences {
        LoginPreferences {
            timezone: self.local_timezone.clone(),
            dark_theme: self.session.theme.is_dark(),
        }
    }

    fn check_account_form(&self, form: &AccountForm, confirmation: &str) -> Result<(), StratifyError> {
        validate_email(&form.email).map_err(|e| self.invalid(e))?;
        if form.username.trim().is_empty() {
            return Err(self.invalid(StratifyError::validation("username", "Enter a username")));
        }
        validate_new_password(&form.password, confirmation).map_err(|e| self.invalid(e))
    }

    fn check_recovery(&self, email: &str, password: &str, confirmation: &str) -> Result<(), StratifyError> {
        validate_email(email).map_err(|e| self.invalid(e))?;
        validate_new_password(password, confirmation).map_err(|e| self.invalid(e))
    }

    fn check_code(&self, code: &str) -> Result<(), StratifyError> {
        validate_verification_code(code).map_err(|e| self.invalid(e))
    }

    fn invalid(&self, err: StratifyError) -> StratifyError {
        self.notifier.notify(Notice::new(&err.user_message()));
        err
    }

    fn report<T>(&self, title: &str, result: Result<T, StratifyError>) -> Result<T, StratifyError> {
        reported(self.notifier.as_ref(), title, result)
    }
}
