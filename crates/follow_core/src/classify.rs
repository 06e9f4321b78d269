/// What a target visit revealed. Either field may be unknown when the
/// platform's rendering did not allow a confident reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetProfile {
    pub private: Option<bool>,
    /// Whether the relation this run severs still exists.
    pub related: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Private,
    AlreadyUnrelated,
    Eligible,
}

/// Private wins over relation state; unknowns fall through to `Eligible` and
/// the mutation itself decides.
pub fn classify(profile: &TargetProfile) -> Classification {
    if profile.private == Some(true) {
        return Classification::Private;
    }
    if profile.related == Some(false) {
        return Classification::AlreadyUnrelated;
    }
    Classification::Eligible
}
