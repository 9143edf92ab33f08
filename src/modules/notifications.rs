use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::challenges::{Challenge, ChallengeService};
use super::cookies::{CONTINUE_CODE, CookieStore};
use super::countries::{Country, CountryMapping};
use super::events::{CHALLENGE_SOLVED_EVENT, EventSource, NOTIFICATION_EVENT};
use super::router::{Router, SCORE_BOARD_ROUTE};
use super::settings::ConfigurationService;
use super::translation::{CHALLENGE_SOLVED, Translator};
use crate::error::Result;

const RANDOM_KEY_LEN: usize = 9;

#[derive(Debug, Clone)]
pub struct NotificationRecord {
    /// Assigned on insertion, unique per controller. Keys may repeat, ids never do.
    pub id: u64,
    pub key: String,
    pub message: String,
    pub flag: String,
    pub country: Option<Country>,
    pub copied: bool,
    pub coding_challenge_id: Option<String>,
    pub challenge_name: Option<String>,
    pub received_at: DateTime<Local>,
}

/// Payload of a `challengeSolved` event. Anything besides `key` may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeSolvedPayload {
    pub key: String,
    pub flag: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub coding_challenge: Option<Value>,
}

impl ChallengeSolvedPayload {
    /// Event fields take precedence over the fetched details.
    fn merged_over(&self, fetched: Challenge) -> Challenge {
        Challenge {
            key: self.key.clone(),
            name: self.name.clone().unwrap_or(fetched.name),
            description: self.description.clone().unwrap_or(fetched.description),
            country: self.country.clone().or(fetched.country),
            coding_challenge: self.coding_challenge.clone().or(fetched.coding_challenge),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationPayload {
    pub message: Option<String>,
    pub key: Option<String>,
}

pub type Redraw = Arc<dyn Fn() + Send + Sync>;

/// Collaborators the controller is wired to.
#[derive(Clone)]
pub struct Services {
    pub challenges: Arc<dyn ChallengeService>,
    pub translator: Arc<dyn Translator>,
    pub countries: Arc<dyn CountryMapping>,
    pub router: Arc<dyn Router>,
    pub cookies: Arc<dyn CookieStore>,
}

#[derive(Default)]
struct FeedState {
    notifications: Vec<NotificationRecord>,
    show_ctf_flags: bool,
    show_country_details: bool,
}

/// Turns real-time events into a newest-first list of dismissible notifications.
///
/// Cloning yields another handle to the same list. Every mutation goes through
/// one lock and is followed by a call to the redraw callback.
#[derive(Clone)]
pub struct NotificationListController {
    state: Arc<Mutex<FeedState>>,
    services: Services,
    redraw: Redraw,
    dropped: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
    torn_down: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl NotificationListController {
    pub fn new(services: Services, redraw: Redraw) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState::default())),
            services,
            redraw,
            dropped: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
            torn_down: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Registers the event handlers and follows both CTF display toggles.
    /// Must be called from within a tokio runtime.
    pub fn activate(&self, events: &dyn EventSource, config: &dyn ConfigurationService) -> Result<()> {
        let runtime = Handle::try_current()?;

        let this = self.clone();
        let rt = runtime.clone();
        events.on(
            CHALLENGE_SOLVED_EVENT,
            Arc::new(move |data| {
                let payload = match serde_json::from_value::<ChallengeSolvedPayload>(data) {
                    Ok(p) if !p.key.is_empty() => p,
                    Ok(_) => return,
                    Err(e) => {
                        debug!(error = %e, "Ignoring challengeSolved payload");
                        return;
                    }
                };
                let this = this.clone();
                rt.spawn(async move { this.on_challenge_solved(payload).await });
            }),
        );

        let this = self.clone();
        events.on(
            NOTIFICATION_EVENT,
            Arc::new(move |data| match serde_json::from_value::<NotificationPayload>(data) {
                Ok(payload) => this.on_notification(payload),
                Err(e) => debug!(error = %e, "Ignoring notification payload"),
            }),
        );

        self.follow(&runtime, config.ctf_flag_mode_status(), |s, on| s.show_ctf_flags = on);
        self.follow(
            &runtime,
            config.show_ctf_country_details_in_notifications(),
            |s, on| s.show_country_details = on,
        );
        Ok(())
    }

    /// Stops following configuration changes and empties the list. Events
    /// delivered afterwards, including lookups still in flight, are discarded.
    pub fn deactivate(&self) {
        self.torn_down.store(true, Ordering::Release);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.state.lock().notifications.clear();
        (self.redraw)();
    }

    fn follow(&self, runtime: &Handle, mut rx: watch::Receiver<bool>, apply: fn(&mut FeedState, bool)) {
        apply(&mut self.state.lock(), *rx.borrow_and_update());
        let this = self.clone();
        let task = runtime.spawn(async move {
            while rx.changed().await.is_ok() {
                let on = *rx.borrow_and_update();
                apply(&mut this.state.lock(), on);
                (this.redraw)();
            }
        });
        self.tasks.lock().push(task);
    }

    pub async fn on_challenge_solved(&self, payload: ChallengeSolvedPayload) {
        if payload.key.is_empty() {
            return;
        }
        match self.solved_record(&payload).await {
            Ok(record) => self.prepend(record),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!(key = %payload.key, error = %e, "Dropping challenge solved notification");
            }
        }
    }

    async fn solved_record(&self, event: &ChallengeSolvedPayload) -> Result<NotificationRecord> {
        let fetched = self.services.challenges.get_challenge(&event.key).await?;
        let challenge = event.merged_over(fetched);
        let country = self.services.countries.map(challenge.country.as_deref());
        let message = self
            .services
            .translator
            .get(
                CHALLENGE_SOLVED,
                &[("challenge", challenge.name.as_str()), ("description", challenge.description.as_str())],
            )
            .await?;

        Ok(NotificationRecord {
            id: 0,
            key: event.key.clone(),
            message,
            flag: event.flag.clone().unwrap_or_default(),
            country,
            copied: false,
            coding_challenge_id: challenge.coding_challenge.is_some().then(|| event.key.clone()),
            challenge_name: Some(challenge.name),
            received_at: Local::now(),
        })
    }

    pub fn on_notification(&self, payload: NotificationPayload) {
        let Some(message) = payload.message.filter(|m| !m.is_empty()) else {
            return;
        };
        let key = payload.key.filter(|k| !k.is_empty()).unwrap_or_else(random_key);
        self.prepend(NotificationRecord {
            id: 0,
            key,
            message,
            flag: String::new(),
            country: None,
            copied: false,
            coding_challenge_id: None,
            challenge_name: None,
            received_at: Local::now(),
        });
    }

    fn prepend(&self, mut record: NotificationRecord) {
        {
            let mut state = self.state.lock();
            if self.torn_down.load(Ordering::Acquire) {
                debug!(key = %record.key, "Controller deactivated, discarding notification");
                return;
            }
            record.id = self.next_id.fetch_add(1, Ordering::Relaxed);
            debug!(key = %record.key, id = record.id, "Notification added");
            state.notifications.insert(0, record);
        }
        (self.redraw)();
    }

    pub fn has_coding_challenge(&self, record: &NotificationRecord) -> bool {
        record.coding_challenge_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn open_coding_challenge(&self, record: &NotificationRecord) {
        match record.coding_challenge_id.as_deref() {
            Some(id) => self.services.router.navigate(SCORE_BOARD_ROUTE, &[("codingChallenge", id)]),
            None => self.services.router.navigate(SCORE_BOARD_ROUTE, &[]),
        }
    }

    /// Removes the record at `index`, or every record when `clear_all` is set.
    /// An out-of-range index is ignored.
    pub fn close_notification(&self, index: usize, clear_all: bool) {
        {
            let mut state = self.state.lock();
            if clear_all {
                state.notifications.clear();
            } else if index < state.notifications.len() {
                state.notifications.remove(index);
            }
        }
        (self.redraw)();
    }

    pub fn copy_to_clipboard(&self, text: &str) {
        self.services.cookies.put(CONTINUE_CODE, text);
    }

    /// Flags the record with `id` as copied. Unknown ids are ignored.
    pub fn mark_copied(&self, id: u64) {
        if let Some(record) = self.state.lock().notifications.iter_mut().find(|n| n.id == id) {
            record.copied = true;
        }
        (self.redraw)();
    }

    /// Current position of the record with `id`.
    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.state.lock().notifications.iter().position(|n| n.id == id)
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.state.lock().notifications.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn show_ctf_flags(&self) -> bool {
        self.state.lock().show_ctf_flags
    }

    pub fn show_country_details(&self) -> bool {
        self.state.lock().show_country_details
    }

    /// Number of `challengeSolved` events dropped because a lookup failed.
    /// Incremented once per `error!` logged for the dropped event, so the two
    /// always agree.
    pub fn dropped_events(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn random_key() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_KEY_LEN)
        .filter_map(|_| std::char::from_digit(rng.gen_range(0..36), 36))
        .collect()
}
