//! Route changes requested by the client (redirects, deep links).

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}
