use tracing::warn;

/// One parsed line of post-receive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub rev_old: String,
    pub rev_new: String,
    pub branch: String,
}

impl RefUpdate {
    /// Parse `<old-rev> <new-rev> <ref>`. The branch is the last `/` segment of
    /// the ref, so `refs/heads/master` becomes `master`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let (Some(rev_old), Some(rev_new), Some(reference), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return None;
        };

        let branch = reference.rsplit('/').next().unwrap_or(reference);

        Some(Self {
            rev_old: rev_old.to_string(),
            rev_new: rev_new.to_string(),
            branch: branch.to_string(),
        })
    }
}

/// Parse a complete post-receive batch. Blank lines are ignored and malformed
/// lines are skipped with a warning.
pub fn parse_ref_updates(input: &str) -> Vec<RefUpdate> {
    input
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let update = RefUpdate::parse(line);
            if update.is_none() {
                warn!(line = line, "skipping malformed ref update");
            }
            update
        })
        .collect()
}
