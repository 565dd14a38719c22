// resfetch-core/src/rewrite.rs
// Per-bucket source path conventions, applied once before anything is fetched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use resfetch_common::{Bucket, FolderRequirements};
use tracing::{debug, warn};

/// Maps a declared source to the path the bucket actually stores it under.
/// Implementations must be idempotent.
pub trait SourceRewrite: Send + Sync {
    fn rewrite(&self, source: &str) -> Option<String>;
}

impl<F> SourceRewrite for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn rewrite(&self, source: &str) -> Option<String> {
        self(source)
    }
}

/// Model zoo layout: every network lives at `<stem>/<stem>.hef`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HefStemLayout;

impl SourceRewrite for HefStemLayout {
    fn rewrite(&self, source: &str) -> Option<String> {
        let stem = Path::new(source).file_stem()?.to_str()?;
        Some(format!("{stem}/{stem}.hef"))
    }
}

pub struct RewriteRules {
    rules: BTreeMap<Bucket, Box<dyn SourceRewrite>>,
}

impl RewriteRules {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, bucket: Bucket, rule: impl SourceRewrite + 'static) -> Self {
        self.rules.insert(bucket, Box::new(rule));
        self
    }

    /// Rewrites every matching requirement in place. Returns how many sources
    /// changed.
    pub fn apply(&self, folders: &mut [FolderRequirements]) -> usize {
        let mut changed = 0;
        for folder in folders.iter_mut() {
            for requirement in folder.requirements.iter_mut() {
                let Some(rule) = self.rules.get(&requirement.bucket) else {
                    continue;
                };
                match rule.rewrite(&requirement.source) {
                    Some(rewritten) if rewritten != requirement.source => {
                        debug!(
                            "Rewrote {} source '{}' -> '{}'",
                            requirement.bucket, requirement.source, rewritten
                        );
                        requirement.source = rewritten;
                        changed += 1;
                    }
                    Some(_) => {}
                    None => warn!(
                        "No {} rewrite for source '{}', keeping it as declared",
                        requirement.bucket, requirement.source
                    ),
                }
            }
        }
        changed
    }
}

impl Default for RewriteRules {
    fn default() -> Self {
        Self::empty().with_rule(Bucket::ModelZoo, HefStemLayout)
    }
}

impl fmt::Debug for RewriteRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRules")
            .field("buckets", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
