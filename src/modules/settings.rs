use tokio::sync::watch;

use crate::config::CtfConfig;

/// Runtime view of the CTF display toggles. Each call hands out a fresh subscription.
pub trait ConfigurationService: Send + Sync {
    fn ctf_flag_mode_status(&self) -> watch::Receiver<bool>;
    fn show_ctf_country_details_in_notifications(&self) -> watch::Receiver<bool>;
}

pub struct WatchConfiguration {
    flag_mode: watch::Sender<bool>,
    country_details: watch::Sender<bool>,
}

impl WatchConfiguration {
    pub fn new(ctf: &CtfConfig) -> Self {
        let (flag_mode, _) = watch::channel(ctf.show_flags_in_notifications);
        let (country_details, _) = watch::channel(ctf.show_country_details_in_notifications);
        Self { flag_mode, country_details }
    }

    pub fn set_ctf_flag_mode(&self, on: bool) {
        self.flag_mode.send_replace(on);
    }

    pub fn toggle_ctf_flag_mode(&self) -> bool {
        let next = !*self.flag_mode.borrow();
        self.set_ctf_flag_mode(next);
        next
    }

    pub fn set_show_country_details(&self, on: bool) {
        self.country_details.send_replace(on);
    }
}

impl ConfigurationService for WatchConfiguration {
    fn ctf_flag_mode_status(&self) -> watch::Receiver<bool> {
        self.flag_mode.subscribe()
    }

    fn show_ctf_country_details_in_notifications(&self) -> watch::Receiver<bool> {
        self.country_details.subscribe()
    }
}
