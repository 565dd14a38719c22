// resfetch-core/src/fetcher.rs
use std::path::{Path, PathBuf};

use resfetch_aio::create_dir_all;
use resfetch_common::error::Result;
use resfetch_common::{manifest, Config, FolderRequirements, Requirement};
use resfetch_net::{RemoteResolver, Resolver};
use tracing::{debug, error, info};

use crate::materialize::{Materialized, Materializer};
use crate::rewrite::RewriteRules;

/// Destination suffixes staged once under the common resources directory.
pub const COMMON_SUFFIXES: [&str; 2] = [".hef", ".mp4"];

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub root_path: PathBuf,
    pub common_resources_dir: PathBuf,
    pub skip_common: bool,
    pub verify_downloads: bool,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_path: config.root_path.clone(),
            common_resources_dir: config.common_resources_dir.clone(),
            skip_common: false,
            verify_downloads: config.verify_downloads,
        }
    }

    pub fn skip_common(mut self, skip: bool) -> Self {
        self.skip_common = skip;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Common,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub stage: Stage,
    pub destination: PathBuf,
    pub outcome: Materialized,
}

/// Every destination handled in a run, in processing order.
#[derive(Debug, Default, Clone)]
pub struct FetchReport {
    pub entries: Vec<ReportEntry>,
    pub rewritten_sources: usize,
}

impl FetchReport {
    fn record(&mut self, stage: Stage, destination: &Path, outcome: Materialized) {
        self.entries.push(ReportEntry {
            stage,
            destination: destination.to_path_buf(),
            outcome,
        });
    }

    fn count(&self, pred: impl Fn(&Materialized) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn present(&self) -> usize {
        self.count(|o| matches!(o, Materialized::Present | Materialized::AlreadyExtracted))
    }

    pub fn linked(&self) -> usize {
        self.count(|o| matches!(o, Materialized::Linked { .. }))
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, Materialized::Downloaded { .. }))
    }

    pub fn extracted(&self) -> usize {
        self.count(|o| matches!(o, Materialized::Downloaded { extracted: true }))
    }
}

/// Drives one complete run: rewrite, common resources, then every folder.
pub struct Fetcher<R> {
    resolver: R,
    options: FetchOptions,
    rules: RewriteRules,
}

impl<R: RemoteResolver> Fetcher<R> {
    pub fn new(resolver: R, options: FetchOptions) -> Self {
        Self {
            resolver,
            options,
            rules: RewriteRules::default(),
        }
    }

    pub fn with_rewrite_rules(mut self, rules: RewriteRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Materializes every requirement and stops at the first error. Anything
    /// already materialized stays on disk.
    pub async fn run(&self, mut folders: Vec<FolderRequirements>) -> Result<FetchReport> {
        let mut report = FetchReport {
            rewritten_sources: self.rules.apply(&mut folders),
            ..FetchReport::default()
        };
        debug!("Rewrote {} requirement sources", report.rewritten_sources);

        // One cache per run.
        let mut materializer = Materializer::new(&self.resolver, self.options.verify_downloads);

        if self.options.skip_common {
            debug!("Skipping common resources staging.");
        } else {
            self.materialize_common(&folders, &mut materializer, &mut report)
                .await?;
        }

        for folder in &folders {
            self.materialize_folder(folder, &mut materializer, &mut report)
                .await?;
        }

        info!(
            "Fetch complete: {} downloaded ({} extracted), {} linked, {} already present",
            report.downloaded(),
            report.extracted(),
            report.linked(),
            report.present()
        );
        Ok(report)
    }

    async fn materialize_common(
        &self,
        folders: &[FolderRequirements],
        materializer: &mut Materializer<'_, R>,
        report: &mut FetchReport,
    ) -> Result<()> {
        for (suffix, requirements) in group_by_suffix(folders) {
            // ".hef" -> "hef"
            let suffix_dir = self
                .options
                .common_resources_dir
                .join(suffix.trim_start_matches('.'));
            create_dir_all(&suffix_dir)?;
            debug!(
                "Staging {} '{}' requirements in {}",
                requirements.len(),
                suffix,
                suffix_dir.display()
            );

            for requirement in requirements {
                let Some(file_name) = requirement.destination_file_name() else {
                    continue;
                };
                let destination = suffix_dir.join(file_name);
                let outcome = materialize_one(materializer, &destination, requirement).await?;
                report.record(Stage::Common, &destination, outcome);
            }
        }
        Ok(())
    }

    async fn materialize_folder(
        &self,
        folder: &FolderRequirements,
        materializer: &mut Materializer<'_, R>,
        report: &mut FetchReport,
    ) -> Result<()> {
        let project_dir = self.options.root_path.join(&folder.path);
        debug!("Materializing folder {}", project_dir.display());

        for requirement in &folder.requirements {
            let destination = project_dir.join(&requirement.destination);
            if let Some(parent) = destination.parent() {
                create_dir_all(parent)?;
            }
            let outcome = materialize_one(materializer, &destination, requirement).await?;
            report.record(Stage::Folder, &destination, outcome);
        }
        Ok(())
    }
}

async fn materialize_one<R: RemoteResolver>(
    materializer: &mut Materializer<'_, R>,
    destination: &Path,
    requirement: &Requirement,
) -> Result<Materialized> {
    materializer
        .materialize(destination, requirement)
        .await
        .inspect_err(|e| {
            error!(
                "Failed to materialize {} at {}: {}",
                requirement,
                destination.display(),
                e
            )
        })
}

/// Requirements whose destination suffix is in `COMMON_SUFFIXES`, grouped by
/// suffix in allow-list order. Identical requirements appear once.
pub fn group_by_suffix(folders: &[FolderRequirements]) -> Vec<(&'static str, Vec<&Requirement>)> {
    COMMON_SUFFIXES
        .iter()
        .filter_map(|&suffix| {
            let mut group: Vec<&Requirement> = Vec::new();
            for requirement in folders.iter().flat_map(|f| f.requirements.iter()) {
                if requirement.destination_suffix().as_deref() == Some(suffix)
                    && !group.contains(&requirement)
                {
                    group.push(requirement);
                }
            }
            (!group.is_empty()).then_some((suffix, group))
        })
        .collect()
}

/// Loads the configured manifests, picks the configured backend and runs.
pub async fn fetch_from_config(config: &Config, skip_common: bool) -> Result<FetchReport> {
    let folders = manifest::load_from_config(config)?;
    let resolver = Resolver::from_config(config)?;
    let options = FetchOptions::from_config(config).skip_common(skip_common);
    Fetcher::new(resolver, options).run(folders).await
}

#[cfg(test)]
mod tests {
    use std::fs;

    use resfetch_aio::is_symlink;
    use resfetch_common::error::FetchError;
    use resfetch_common::Bucket;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{tarball, write_file, Call, ScriptedResolver};

    fn options(tmp: &TempDir) -> FetchOptions {
        FetchOptions {
            root_path: tmp.path().join("root"),
            common_resources_dir: tmp.path().join("common"),
            skip_common: false,
            verify_downloads: false,
        }
    }

    fn folder(path: &str, requirements: Vec<Requirement>) -> FolderRequirements {
        FolderRequirements {
            path: path.into(),
            requirements,
        }
    }

    fn canonical(path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap()
    }

    #[tokio::test]
    async fn shared_model_is_downloaded_once_into_common_dir() {
        let tmp = TempDir::new().unwrap();
        let resolver =
            ScriptedResolver::new().with_object(Bucket::ModelZoo, "model_a/model_a.hef", b"hef");
        let folders = vec![
            folder(
                "app1",
                vec![Requirement::new("model_a", "model_a.hef", Bucket::ModelZoo)],
            ),
            folder(
                "app2",
                vec![Requirement::new(
                    "model_a",
                    "weights/model_a.hef",
                    Bucket::ModelZoo,
                )],
            ),
        ];

        let fetcher = Fetcher::new(resolver, options(&tmp));
        let report = fetcher.run(folders).await.unwrap();

        let common_copy = tmp.path().join("common/hef/model_a.hef");
        assert_eq!(fetcher.resolver().downloads(), vec![common_copy.clone()]);
        assert!(common_copy.is_file() && !is_symlink(&common_copy));
        for link in ["root/app1/model_a.hef", "root/app2/weights/model_a.hef"] {
            let link = tmp.path().join(link);
            assert!(is_symlink(&link), "{} should be a symlink", link.display());
            assert_eq!(canonical(&link), canonical(&common_copy));
        }
        assert_eq!(report.rewritten_sources, 2);
        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.linked(), 2);
    }

    #[tokio::test]
    async fn identical_content_yields_one_file_and_links() {
        let tmp = TempDir::new().unwrap();
        let resolver = ScriptedResolver::new()
            .with_object(Bucket::Tappas, "libs/a.so", b"shared object")
            .with_object(Bucket::Other, "mirror/a.so", b"shared object")
            .with_object(Bucket::Tappas, "libs/b.so", b"different");
        let folders = vec![
            folder(
                "app1",
                vec![
                    Requirement::new("libs/a.so", "lib/a.so", Bucket::Tappas),
                    Requirement::new("libs/b.so", "lib/b.so", Bucket::Tappas),
                ],
            ),
            folder(
                "app2",
                vec![Requirement::new("mirror/a.so", "lib/a.so", Bucket::Other)],
            ),
        ];

        let fetcher = Fetcher::new(resolver, options(&tmp));
        fetcher.run(folders).await.unwrap();

        let first = tmp.path().join("root/app1/lib/a.so");
        let second = tmp.path().join("root/app2/lib/a.so");
        assert!(!is_symlink(&first));
        assert!(is_symlink(&second));
        assert_eq!(canonical(&second), canonical(&first));
        assert!(!is_symlink(&tmp.path().join("root/app1/lib/b.so")));
        assert_eq!(fetcher.resolver().downloads().len(), 2);
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let tmp = TempDir::new().unwrap();
        let archive = tarball(&[("a.txt", b"alpha"), ("b.txt", b"beta")]);
        let build_resolver = || {
            ScriptedResolver::new()
                .with_object(Bucket::ModelZoo, "net/net.hef", b"network")
                .with_object(Bucket::Tappas, "video/clip.mp4", b"frames")
                .with_object(Bucket::Tappas, "bundle.tar.gz", &archive)
        };
        let folders = vec![
            folder(
                "app1",
                vec![
                    Requirement::new("net", "net.hef", Bucket::ModelZoo),
                    Requirement::new("video/clip.mp4", "clip.mp4", Bucket::Tappas),
                    Requirement::new("bundle.tar.gz", "data/bundle.tar.gz", Bucket::Tappas)
                        .extracted(),
                ],
            ),
            folder(
                "app2",
                vec![Requirement::new("net", "models/net.hef", Bucket::ModelZoo)],
            ),
        ];

        let first = Fetcher::new(build_resolver(), options(&tmp));
        let report = first.run(folders.clone()).await.unwrap();
        assert_eq!(report.downloaded(), 3);
        assert_eq!(report.extracted(), 1);

        let second = Fetcher::new(build_resolver(), options(&tmp));
        let report = second.run(folders).await.unwrap();
        assert!(second.resolver().downloads().is_empty());
        assert!(second.resolver().calls().is_empty());
        assert_eq!(report.downloaded(), 0);
        assert_eq!(report.present(), report.entries.len());
    }

    #[tokio::test]
    async fn common_resources_come_before_folders() {
        let tmp = TempDir::new().unwrap();
        let resolver = ScriptedResolver::new()
            .with_object(Bucket::Tappas, "tools.bin", b"tools")
            .with_object(Bucket::Tappas, "video/clip.mp4", b"frames")
            .with_object(Bucket::ModelZoo, "net/net.hef", b"network");
        let folders = vec![folder(
            "app",
            vec![
                Requirement::new("tools.bin", "tools.bin", Bucket::Tappas),
                Requirement::new("video/clip.mp4", "media/clip.mp4", Bucket::Tappas),
                Requirement::new("net", "net.hef", Bucket::ModelZoo),
            ],
        )];

        let fetcher = Fetcher::new(resolver, options(&tmp));
        let report = fetcher.run(folders).await.unwrap();

        let stages: Vec<Stage> = report.entries.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Common, Stage::Common, Stage::Folder, Stage::Folder, Stage::Folder]
        );
        // Allow-list order: .hef before .mp4.
        assert_eq!(
            report.entries[0].destination,
            tmp.path().join("common/hef/net.hef")
        );
        assert_eq!(
            report.entries[1].destination,
            tmp.path().join("common/mp4/clip.mp4")
        );
        assert_eq!(
            fetcher.resolver().downloads(),
            vec![
                tmp.path().join("common/hef/net.hef"),
                tmp.path().join("common/mp4/clip.mp4"),
                tmp.path().join("root/app/tools.bin"),
            ]
        );
        // Folder entries keep manifest order.
        assert_eq!(
            report.entries[2].destination,
            tmp.path().join("root/app/tools.bin")
        );
        assert!(matches!(
            report.entries[3].outcome,
            Materialized::Linked { .. }
        ));
    }

    #[tokio::test]
    async fn skip_common_materializes_folders_only() {
        let tmp = TempDir::new().unwrap();
        let resolver =
            ScriptedResolver::new().with_object(Bucket::ModelZoo, "net/net.hef", b"network");
        let folders = vec![folder(
            "app",
            vec![Requirement::new("net", "net.hef", Bucket::ModelZoo)],
        )];

        let fetcher = Fetcher::new(resolver, options(&tmp).skip_common(true));
        let report = fetcher.run(folders).await.unwrap();

        assert!(!tmp.path().join("common").exists());
        assert_eq!(
            fetcher.resolver().downloads(),
            vec![tmp.path().join("root/app/net.hef")]
        );
        assert!(report.entries.iter().all(|e| e.stage == Stage::Folder));
    }

    #[tokio::test]
    async fn existing_destination_is_never_downloaded() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("root/app/config.json"), b"{}");
        let resolver = ScriptedResolver::new();
        let folders = vec![folder(
            "app",
            vec![Requirement::new("config.json", "config.json", Bucket::Tappas)],
        )];

        let fetcher = Fetcher::new(resolver, options(&tmp));
        let report = fetcher.run(folders).await.unwrap();

        assert!(fetcher.resolver().calls().is_empty());
        assert_eq!(report.entries[0].outcome, Materialized::Present);
    }

    #[tokio::test]
    async fn first_error_stops_the_run_and_keeps_earlier_files() {
        let tmp = TempDir::new().unwrap();
        let resolver = ScriptedResolver::new().with_object(Bucket::Tappas, "ok.bin", b"fine");
        let folders = vec![
            folder(
                "app",
                vec![
                    Requirement::new("ok.bin", "ok.bin", Bucket::Tappas),
                    Requirement::new("gone.bin", "gone.bin", Bucket::Tappas),
                ],
            ),
            folder(
                "later",
                vec![Requirement::new("ok.bin", "ok.bin", Bucket::Tappas)],
            ),
        ];

        let fetcher = Fetcher::new(resolver, options(&tmp));
        let err = fetcher.run(folders).await.unwrap_err();

        assert!(matches!(err, FetchError::DownloadError(..)));
        assert!(tmp.path().join("root/app/ok.bin").is_file());
        assert!(!tmp.path().join("root/later").exists());
        assert_eq!(
            fetcher.resolver().calls().last(),
            Some(&Call::RemoteHash("gone.bin".to_string()))
        );
    }

    #[tokio::test]
    async fn fetch_from_config_reads_manifests_and_uses_mirror() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_file(&tmp.path().join("mirror/model_zoo/net/net.hef"), b"network");
        write_file(&tmp.path().join("mirror/tappas/docs/readme.txt"), b"hello");
        write_file(
            &root.join("downloader/requirements/app.json"),
            br#"{
                "path": "apps/detection",
                "requirements": [
                    {"source": "net", "destination": "resources/net.hef", "bucket": "model_zoo"},
                    {"source": "docs/readme.txt", "destination": "README.txt", "bucket": "tappas"}
                ]
            }"#,
        );
        let config = Config {
            root_path: root.clone(),
            requirements_dir: root.join("downloader/requirements"),
            requirements_files: Vec::new(),
            common_resources_dir: root.join("apps/gstreamer/resources"),
            backend: resfetch_common::BackendKind::Mirror,
            remote_base_url: None,
            mirror_root: Some(tmp.path().join("mirror")),
            verify_downloads: true,
        };

        let report = fetch_from_config(&config, false).await.unwrap();

        let shared = root.join("apps/gstreamer/resources/hef/net.hef");
        assert_eq!(fs::read(&shared).unwrap(), b"network");
        let linked = root.join("apps/detection/resources/net.hef");
        assert!(is_symlink(&linked));
        assert_eq!(
            fs::read(root.join("apps/detection/README.txt")).unwrap(),
            b"hello"
        );
        assert_eq!(report.downloaded(), 2);
        assert_eq!(report.linked(), 1);
    }

    #[tokio::test]
    async fn bad_manifest_fails_before_any_fetch() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_file(&root.join("req/broken.json"), b"{ not json");
        let config = Config {
            root_path: root.clone(),
            requirements_dir: root.join("req"),
            requirements_files: Vec::new(),
            common_resources_dir: root.join("common"),
            backend: resfetch_common::BackendKind::Mirror,
            remote_base_url: None,
            mirror_root: Some(tmp.path().join("mirror")),
            verify_downloads: false,
        };

        let err = fetch_from_config(&config, false).await.unwrap_err();
        assert!(matches!(err, FetchError::ManifestError(..)));
        assert!(!root.join("common").exists());
    }

    #[test]
    fn grouping_dedupes_and_ignores_other_suffixes() {
        let net = Requirement::new("net", "net.hef", Bucket::ModelZoo);
        let folders = vec![
            folder(
                "a",
                vec![
                    Requirement::new("clip.mp4", "clip.mp4", Bucket::Tappas),
                    net.clone(),
                    Requirement::new("x.so", "x.so", Bucket::Tappas),
                ],
            ),
            folder("b", vec![net.clone()]),
        ];

        let groups = group_by_suffix(&folders);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ".hef");
        assert_eq!(groups[0].1, vec![&net]);
        assert_eq!(groups[1].0, ".mp4");
        assert_eq!(groups[1].1.len(), 1);
    }
}
