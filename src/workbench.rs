use std::collections::HashMap;

use log::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::EditMetrics;
use crate::session::EditorSession;
use crate::store::ProgressStore;

/// Identity under which a translator's progress is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub name: String,
    pub surname: String,
}

impl UserKey {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
        }
    }
}

/// Holds one `EditorSession` per signed-in user plus the shared store.
///
/// Not synchronized; wrap it in a mutex when handlers run concurrently.
#[derive(Debug)]
pub struct Workbench<C: Clock + Clone = SystemClock> {
    store: ProgressStore,
    config: Config,
    clock: C,
    sessions: HashMap<UserKey, EditorSession<C>>,
}

impl<C: Clock + Clone> Workbench<C> {
    pub fn new(store: ProgressStore, config: Config, clock: C) -> Self {
        Self {
            store,
            config,
            clock,
            sessions: HashMap::new(),
        }
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The user's session, created on first use.
    pub fn session(&mut self, user: &UserKey) -> &mut EditorSession<C> {
        let auto_save = self.config.auto_save;
        let clock = &self.clock;
        self.sessions.entry(user.clone()).or_insert_with(|| {
            let mut session =
                EditorSession::new(clock.clone()).with_user(&user.name, &user.surname);
            session.auto_save = auto_save;
            session
        })
    }

    pub fn end_session(&mut self, user: &UserKey) -> Option<EditorSession<C>> {
        self.sessions.remove(user)
    }

    pub fn save_progress(&mut self, user: &UserKey) -> Result<()> {
        let Some(session) = self.sessions.get_mut(user) else {
            return Ok(());
        };
        let progress = session.to_progress();
        self.store.save(&progress)?;
        session.last_saved = Some(progress.last_updated);
        info!("progress saved for {} {}", user.name, user.surname);
        Ok(())
    }

    /// Returns `false` when the store holds nothing resumable for `user`.
    pub fn load_progress(&mut self, user: &UserKey) -> Result<bool> {
        let Some(progress) = self.store.load(&user.name, &user.surname)? else {
            return Ok(false);
        };
        Ok(self.session(user).restore(progress)?)
    }

    pub fn next(&mut self, user: &UserKey, edited: &str) -> Result<Option<EditMetrics>> {
        let saved = self.session(user).next(edited);
        self.auto_save(user, saved)
    }

    pub fn previous(&mut self, user: &UserKey, edited: &str) -> Result<Option<EditMetrics>> {
        let saved = self.session(user).previous(edited);
        self.auto_save(user, saved)
    }

    pub fn finish(&mut self, user: &UserKey, edited: &str) -> Result<Option<EditMetrics>> {
        let saved = self.session(user).finish(edited);
        self.auto_save(user, saved)
    }

    fn auto_save(
        &mut self,
        user: &UserKey,
        saved: Option<EditMetrics>,
    ) -> Result<Option<EditMetrics>> {
        let wants_save = self
            .sessions
            .get(user)
            .is_some_and(|s| s.auto_save && s.has_user());
        if saved.is_some() && wants_save {
            self.save_progress(user)?;
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn workbench(auto_save: bool) -> (Workbench<ManualClock>, ManualClock) {
        let clock = ManualClock::at_epoch();
        let config = Config {
            auto_save,
            database_path: None,
        };
        let store = ProgressStore::open_in_memory().unwrap();
        (Workbench::new(store, config, clock.clone()), clock)
    }

    #[test]
    fn sessions_are_per_user() {
        let (mut bench, _clock) = workbench(true);
        let ada = UserKey::new("Ada", "Lovelace");
        let grace = UserKey::new("Grace", "Hopper");

        bench.session(&ada).load_segments("a", "A").unwrap();
        assert_eq!(bench.session(&ada).segments.len(), 1);
        assert!(bench.session(&grace).segments.is_empty());
        assert_eq!(bench.session(&grace).user_name, "Grace");
    }

    #[test]
    fn auto_save_persists_after_next() {
        let (mut bench, clock) = workbench(true);
        let ada = UserKey::new("Ada", "Lovelace");
        bench.session(&ada).load_segments("one\ntwo", "uno\ndue").unwrap();
        bench.session(&ada).select_segment(0);
        clock.advance_secs(5.0);

        let saved = bench.next(&ada, "uno!").unwrap();
        assert!(saved.is_some());

        let stored = bench.store().load("Ada", "Lovelace").unwrap().unwrap();
        assert_eq!(stored.metrics.len(), 1);
        assert_eq!(stored.full_text.len(), 2);
        assert!(stored.time_tracker.is_some());
        assert_eq!(bench.session(&ada).last_saved, Some(clock.now()));
    }

    #[test]
    fn nothing_saved_without_auto_save() {
        let (mut bench, _clock) = workbench(false);
        let ada = UserKey::new("Ada", "Lovelace");
        bench.session(&ada).load_segments("one", "uno").unwrap();
        bench.session(&ada).select_segment(0);
        bench.finish(&ada, "uno!").unwrap();

        assert!(bench.store().load("Ada", "Lovelace").unwrap().is_none());
    }

    #[test]
    fn load_progress_restores_into_fresh_session() {
        let (mut bench, clock) = workbench(true);
        let ada = UserKey::new("Ada", "Lovelace");
        bench.session(&ada).load_segments("one\ntwo", "uno\ndue").unwrap();
        bench.session(&ada).select_segment(0);
        clock.advance_secs(7.0);
        bench.next(&ada, "uno!").unwrap();
        bench.end_session(&ada);

        assert!(bench.load_progress(&ada).unwrap());
        let session = bench.session(&ada);
        assert_eq!(session.current_segment, 0);
        assert_eq!(session.editing_time(0), 7.0);
        assert_eq!(session.segments.len(), 2);

        assert!(!bench.load_progress(&UserKey::new("No", "One")).unwrap());
    }
}
