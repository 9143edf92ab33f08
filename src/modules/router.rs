use parking_lot::Mutex;
use std::process::Command;
use tracing::{info, warn};

pub const SCORE_BOARD_ROUTE: &str = "/score-board";

pub trait Router: Send + Sync {
    fn navigate(&self, path: &str, query: &[(&str, &str)]);
}

/// Opens application routes in the system browser (hash routing, `<base>/#/<route>?<query>`).
pub struct BrowserRouter {
    base_url: String,
    launch: bool,
    last_url: Mutex<Option<String>>,
}

impl BrowserRouter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), launch: true, last_url: Mutex::new(None) }
    }

    /// Records routes without starting a browser.
    pub fn headless(base_url: impl Into<String>) -> Self {
        Self { launch: false, ..Self::new(base_url) }
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().clone()
    }

    pub fn url_for(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!("{}/#/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }

    fn open_url(&self, url: &str) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        { Command::new("open").arg(url).spawn()?; }
        #[cfg(target_os = "linux")]
        { Command::new("xdg-open").arg(url).spawn()?; }
        #[cfg(target_os = "windows")]
        { Command::new("cmd").args(["/C", "start", "", url]).spawn()?; }
        Ok(())
    }
}

impl Router for BrowserRouter {
    fn navigate(&self, path: &str, query: &[(&str, &str)]) {
        let url = self.url_for(path, query);
        info!(%url, "Navigating");
        if self.launch {
            if let Err(e) = self.open_url(&url) {
                warn!(error = %e, %url, "Failed to open browser");
            }
        }
        *self.last_url.lock() = Some(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_score_board_with_query() {
        let router = BrowserRouter::headless("http://localhost:3000/");
        assert_eq!(
            router.url_for(SCORE_BOARD_ROUTE, &[("codingChallenge", "scoreBoardChallenge")]),
            "http://localhost:3000/#/score-board?codingChallenge=scoreBoardChallenge"
        );
    }

    #[test]
    fn test_query_values_are_percent_encoded() {
        let router = BrowserRouter::headless("http://h");
        assert_eq!(router.url_for("/x", &[("q", "a b&c")]), "http://h/#/x?q=a%20b%26c");
        assert_eq!(router.url_for("/x", &[]), "http://h/#/x");
    }

    #[test]
    fn test_non_ascii_and_reserved_query_values() {
        let router = BrowserRouter::headless("http://h");
        assert_eq!(
            router.url_for("/x", &[("name", "ä/é=1")]),
            "http://h/#/x?name=%C3%A4%2F%C3%A9%3D1"
        );
        assert_eq!(router.url_for("/x", &[("k", "a-b_c.d~e")]), "http://h/#/x?k=a-b_c.d~e");
    }

    #[test]
    fn test_headless_navigate_records_last_url() {
        let router = BrowserRouter::headless("http://h");
        assert!(router.last_url().is_none());
        router.navigate(SCORE_BOARD_ROUTE, &[("codingChallenge", "k1")]);
        assert_eq!(router.last_url().as_deref(), Some("http://h/#/score-board?codingChallenge=k1"));
    }
}
