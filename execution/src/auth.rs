use std::collections::HashSet;

/// Privileged operations gated behind an [Authorizer].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Overwrite any account's balance.
    SetBalance,
    /// Read or change a game's win probability.
    TuneWinRate,
}

pub trait Authorizer: Send + Sync {
    fn allows(&self, caller: &str, capability: Capability) -> bool;
}

/// Grants every capability to a fixed set of administrator ids.
///
/// The default set is empty and denies everyone.
#[derive(Clone, Debug, Default)]
pub struct AdminSet {
    admins: HashSet<String>,
}

impl AdminSet {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins
                .into_iter()
                .map(Into::into)
                .map(|id: String| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

impl Authorizer for AdminSet {
    fn allows(&self, caller: &str, _capability: Capability) -> bool {
        self.admins.contains(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_set_grants_only_listed_ids() {
        let policy = AdminSet::new([" 1 ", "2", ""]);
        assert_eq!(policy.len(), 2);
        assert!(policy.allows("1", Capability::SetBalance));
        assert!(policy.allows("2", Capability::TuneWinRate));
        assert!(!policy.allows("3", Capability::SetBalance));
    }

    #[test]
    fn test_default_denies_everyone() {
        let policy = AdminSet::default();
        assert!(policy.is_empty());
        assert!(!policy.allows("1", Capability::SetBalance));
    }
}
