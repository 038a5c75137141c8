use std::sync::OnceLock;

use holdall_types::Oid;

/// Write-once slot for the identity a database assigns to an object.
///
/// Embedded in every persistent object. Once bound, the identity never
/// changes.
#[derive(Debug, Default)]
pub struct PersistenceCell(OnceLock<Oid>);

impl PersistenceCell {
    pub fn new() -> Self {
        Self(OnceLock::new())
    }

    /// A cell already bound to `oid`.
    pub fn bound(oid: Oid) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(oid);
        Self(cell)
    }

    /// The assigned identity, if the object has been registered.
    pub fn oid(&self) -> Option<Oid> {
        self.0.get().copied()
    }

    /// Bind the identity produced by `assign`, unless already bound.
    /// Returns the identity the cell ends up holding.
    pub fn bind_with(&self, assign: impl FnOnce() -> Oid) -> Oid {
        *self.0.get_or_init(assign)
    }
}

/// An object that can be registered with an [`ObjectDatabase`].
///
/// [`ObjectDatabase`]: crate::traits::ObjectDatabase
pub trait Persistent: Send + Sync {
    fn persistence(&self) -> &PersistenceCell;

    fn oid(&self) -> Option<Oid> {
        self.persistence().oid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_once() {
        let cell = PersistenceCell::new();
        assert_eq!(cell.oid(), None);
        assert_eq!(cell.bind_with(|| Oid::new(1)), Oid::new(1));
        assert_eq!(cell.bind_with(|| Oid::new(2)), Oid::new(1));
        assert_eq!(cell.oid(), Some(Oid::new(1)));
    }

    #[test]
    fn bound_cell_reports_identity() {
        assert_eq!(PersistenceCell::bound(Oid::new(9)).oid(), Some(Oid::new(9)));
    }
}
