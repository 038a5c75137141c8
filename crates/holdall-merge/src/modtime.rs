use holdall_types::{ModTime, Timestamp};

/// Merge three versions of a bare timestamp.
pub fn resolve_modtime(old: Timestamp, committed: Timestamp, mine: Timestamp) -> Timestamp {
    ModTime::resolve_conflict(old, committed, mine)
}

/// Persisted state that carries its own modification time.
pub trait ModTracked {
    fn mod_time(&self) -> ModTime;
    fn set_mod_time(&mut self, t: ModTime);
}

/// Keep this transaction's version of a typed state, with the newest of the
/// three timestamps.
pub fn resolve_with_max_modtime<S: ModTracked + Clone>(old: &S, committed: &S, mine: &S) -> S {
    let newest = resolve_modtime(
        old.mod_time().value(),
        committed.mod_time().value(),
        mine.mod_time().value(),
    );
    let mut merged = mine.clone();
    merged.set_mod_time(ModTime::at(newest));
    merged
}
