use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::modules::{
    challenges::{CatalogChallengeService, ChallengeService, HttpChallengeService},
    clipboard,
    cookies::{CONTINUE_CODE, CookieStore, FileCookieStore},
    countries::TableCountryMapping,
    events::{EventBus, spawn_file_feed},
    notifications::{NotificationListController, NotificationRecord, Services},
    router::BrowserRouter,
    settings::WatchConfiguration,
    translation::TemplateTranslator,
};

pub struct App {
    pub selected_index: usize,
    /// Id of the selected record. New records are prepended, so the index
    /// alone would drift onto a different record.
    selected_id: Option<u64>,
    pub status_message: String,
    pub show_help: bool,
    pub controller: NotificationListController,
    pub settings: Arc<WatchConfiguration>,
    pub router: Arc<BrowserRouter>,
    pub bus: EventBus,
    pub events_path: Option<PathBuf>,
    dirty: Arc<AtomicBool>,
    feed: Option<JoinHandle<()>>,
}

impl App {
    pub async fn with_router(
        config: Config,
        events_override: Option<PathBuf>,
        router: Arc<BrowserRouter>,
    ) -> Result<Self> {
        let challenges: Arc<dyn ChallengeService> = match &config.server.challenge_api {
            Some(api) => Arc::new(HttpChallengeService::new(api.clone())),
            None => Arc::new(CatalogChallengeService::new(&config.challenges)),
        };

        let mut translator = TemplateTranslator::new(config.translations.clone());
        if let Some(path) = &config.language_file {
            translator
                .load_language_file(path)
                .with_context(|| format!("Loading language file {:?}", path))?;
        }

        let cookies = FileCookieStore::open(&config.cookie_path)
            .with_context(|| format!("Opening cookie jar {:?}", config.cookie_path))?;
        if cookies.get(CONTINUE_CODE).is_some() {
            info!(path = ?config.cookie_path, "Continue code on file");
        }

        let dirty = Arc::new(AtomicBool::new(true));
        let flag = dirty.clone();
        let controller = NotificationListController::new(
            Services {
                challenges,
                translator: Arc::new(translator),
                countries: Arc::new(TableCountryMapping::new(config.country_mapping.clone())),
                router: router.clone(),
                cookies: Arc::new(cookies),
            },
            Arc::new(move || flag.store(true, Ordering::Release)),
        );

        let bus = EventBus::new();
        let settings = Arc::new(WatchConfiguration::new(&config.ctf));
        controller.activate(&bus, settings.as_ref())?;

        let events_path = events_override.or(config.events_path.clone());
        let feed = events_path.clone().map(|path| {
            info!(path = ?path, "Following event feed");
            spawn_file_feed(bus.clone(), path)
        });

        let status_message = match &events_path {
            Some(p) => format!("Listening on {}. Press '?' for help", p.display()),
            None => "No event feed configured. Press '?' for help".to_string(),
        };

        Ok(Self {
            selected_index: 0,
            selected_id: None,
            status_message,
            show_help: false,
            controller,
            settings,
            router,
            bus,
            events_path,
            dirty,
            feed,
        })
    }

    /// True when something changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        let dirty = self.dirty.swap(false, Ordering::AcqRel);
        if dirty {
            self.sync_selection();
        }
        dirty
    }

    pub fn request_redraw(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn selected(&self) -> Option<NotificationRecord> {
        let list = self.controller.notifications();
        match self.selected_id {
            Some(id) => list.into_iter().find(|n| n.id == id),
            None => list.into_iter().nth(self.selected_index),
        }
    }

    /// Moves `selected_index` to wherever the selected record now sits. Falls
    /// back to the nearest valid index once that record is gone.
    fn sync_selection(&mut self) {
        let list = self.controller.notifications();
        match self.selected_id.and_then(|id| list.iter().position(|n| n.id == id)) {
            Some(pos) => self.selected_index = pos,
            None if self.selected_index >= list.len() => {
                self.selected_index = list.len().saturating_sub(1);
            }
            None => {}
        }
        self.selected_id = list.get(self.selected_index).map(|n| n.id);
    }

    fn select(&mut self, index: usize) {
        self.selected_index = index;
        self.selected_id = None;
        self.sync_selection();
    }

    pub fn next_item(&mut self) {
        self.sync_selection();
        let max = self.controller.len();
        if max > 0 {
            self.select((self.selected_index + 1) % max);
        }
    }

    pub fn previous_item(&mut self) {
        self.sync_selection();
        let max = self.controller.len();
        if max > 0 {
            self.select(if self.selected_index == 0 { max - 1 } else { self.selected_index - 1 });
        }
    }

    pub fn go_home(&mut self) {
        self.select(0);
    }

    pub fn go_end(&mut self) {
        self.select(self.controller.len().saturating_sub(1));
    }

    pub fn dismiss(&mut self, clear_all: bool) {
        self.sync_selection();
        if self.controller.is_empty() {
            return;
        }
        self.controller.close_notification(self.selected_index, clear_all);
        self.status_message = if clear_all {
            "Dismissed all notifications".to_string()
        } else {
            "Notification dismissed".to_string()
        };
        self.sync_selection();
    }

    /// Copies the selected flag to the clipboard and keeps it as the continue code.
    pub fn copy_selected(&mut self) {
        self.sync_selection();
        let Some(record) = self.selected() else { return };
        if record.flag.is_empty() {
            self.status_message = "No flag to copy".to_string();
            return;
        }
        if let Err(e) = clipboard::copy_text(&record.flag) {
            self.report_error("Copy failed", e);
            return;
        }
        self.controller.mark_copied(record.id);
        self.controller.copy_to_clipboard(&record.flag);
        self.status_message = format!("Copied flag of {}", record.challenge_name.as_deref().unwrap_or(record.key.as_str()));
    }

    pub fn open_selected(&mut self) {
        self.sync_selection();
        let Some(record) = self.selected() else { return };
        if !self.controller.has_coding_challenge(&record) {
            self.status_message = "No coding challenge for this notification".to_string();
            return;
        }
        self.controller.open_coding_challenge(&record);
        self.status_message = match self.router.last_url() {
            Some(url) => format!("Opened {}", url),
            None => "Opened coding challenge".to_string(),
        };
    }

    pub fn toggle_flags(&mut self) {
        let on = self.settings.toggle_ctf_flag_mode();
        self.status_message = format!("CTF flags {}", if on { "shown" } else { "hidden" });
    }

    pub fn toggle_countries(&mut self) {
        let on = !self.controller.show_country_details();
        self.settings.set_show_country_details(on);
        self.status_message = format!("Country details {}", if on { "shown" } else { "hidden" });
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
        self.request_redraw();
    }

    pub fn report_error(&mut self, context: &str, err: anyhow::Error) {
        warn!(error = %err, "{}", context);
        self.status_message = format!("{}: {}", context, err);
    }

    pub fn shutdown(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        self.controller.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChallengeConfig, CtfConfig, ServerConfig};
    use crate::modules::events::{CHALLENGE_SOLVED_EVENT, NOTIFICATION_EVENT};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> Config {
        Config {
            path: dir.join("config.toml"),
            events_path: None,
            cookie_path: dir.join("cookies.json"),
            language_file: None,
            server: ServerConfig::default(),
            ctf: CtfConfig::default(),
            translations: BTreeMap::new(),
            country_mapping: BTreeMap::new(),
            challenges: vec![ChallengeConfig {
                key: "scoreBoardChallenge".into(),
                name: "Score Board".into(),
                description: "Find it.".into(),
                country: None,
                coding_challenge: true,
            }],
        }
    }

    async fn app(dir: &std::path::Path) -> App {
        let router = Arc::new(BrowserRouter::headless("http://localhost:3000"));
        App::with_router(config(dir), None, router).await.unwrap()
    }

    #[tokio::test]
    async fn test_navigation_and_dismissal() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        for m in ["a", "b", "c"] {
            app.bus.dispatch(NOTIFICATION_EVENT, json!({ "message": m }));
        }
        assert!(app.take_redraw());
        assert!(!app.take_redraw());

        app.previous_item();
        assert_eq!(app.selected_index, 2);
        app.dismiss(false);
        assert_eq!(app.selected_index, 1);
        assert_eq!(app.controller.len(), 2);

        app.dismiss(true);
        assert!(app.controller.is_empty());
        assert_eq!(app.selected_index, 0);
        app.next_item();
        assert_eq!(app.selected_index, 0);
        app.shutdown();
    }

    #[tokio::test]
    async fn test_selection_stays_on_record_when_new_ones_arrive() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        for m in ["a", "b"] {
            app.bus.dispatch(NOTIFICATION_EVENT, json!({ "message": m }));
        }
        app.next_item();
        assert_eq!(app.selected().unwrap().message, "a");

        app.bus.dispatch(NOTIFICATION_EVENT, json!({ "message": "c" }));
        assert_eq!(app.selected().unwrap().message, "a");
        assert!(app.take_redraw());
        assert_eq!(app.selected_index, 2);

        app.bus.dispatch(NOTIFICATION_EVENT, json!({ "message": "d" }));
        app.dismiss(false);
        let messages: Vec<String> = app.controller.notifications().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["d", "c", "b"]);
        assert_eq!(app.selected().unwrap().message, "b");
        app.shutdown();
    }

    #[tokio::test]
    async fn test_open_selected_coding_challenge() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        app.bus.dispatch(CHALLENGE_SOLVED_EVENT, json!({ "key": "scoreBoardChallenge", "flag": "FLAG{sb}" }));
        for _ in 0..40 {
            if !app.controller.is_empty() { break; }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        app.open_selected();
        assert_eq!(
            app.router.last_url().as_deref(),
            Some("http://localhost:3000/#/score-board?codingChallenge=scoreBoardChallenge")
        );
        app.shutdown();
    }

    #[tokio::test]
    async fn test_toggle_flags_updates_controller() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        assert!(!app.controller.show_ctf_flags());
        app.toggle_flags();
        for _ in 0..40 {
            if app.controller.show_ctf_flags() { break; }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(app.controller.show_ctf_flags());
        app.shutdown();
    }

    #[tokio::test]
    async fn test_copy_without_flag_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        app.bus.dispatch(NOTIFICATION_EVENT, json!({ "message": "plain" }));
        app.copy_selected();
        assert_eq!(app.status_message, "No flag to copy");
        assert!(!app.controller.notifications()[0].copied);
        app.shutdown();
    }
}
