//! Integration tests for pull-request comparison, mergeability and merging.

mod common;

use common::{run_git, TestHost};

use hostgit::core::types::{BranchName, Oid, RepoId, Signature};
use hostgit::engine::compare::{
    merged_pull_info, parse_compare, prepare_diff, pull_info, CompareDiff, CompareInfo, HeadRef,
};
use hostgit::engine::merge::{merge, MergeRequest, MergeStyle};
use hostgit::engine::mergeable::{ensure_mergeable, test_mergeability, test_patch, MergeStatus};
use hostgit::engine::HostError;

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

/// `alice/notes` with `feature` two commits ahead of `main`.
fn host_with_feature() -> (TestHost, RepoId) {
    let host = TestHost::new();
    let repo = host.create_repo("alice/notes");
    host.commit(&repo, Some("main"), "feature", &[("src/lib.rs", "pub fn a() {}\n")]);
    host.commit(&repo, None, "feature", &[("docs/a.md", "# A\n")]);
    host.push(&repo, "feature");
    (host, repo)
}

fn compare_local(host: &TestHost, repo: &RepoId, base: &str, head: &str) -> CompareInfo {
    parse_compare(&host.ctx, repo, &branch(base), &HeadRef::Local(branch(head))).unwrap()
}

fn merge_request(repo: &RepoId, head: &str, style: MergeStyle) -> MergeRequest {
    MergeRequest {
        base_repo: repo.clone(),
        base_branch: branch("main"),
        head_repo: repo.clone(),
        head_branch: branch(head),
        style,
        doer: Signature::new("Bob", "bob@example.com"),
        description: String::new(),
    }
}

// =============================================================================
// Compare
// =============================================================================

mod compare {
    use super::*;

    #[tokio::test]
    async fn same_repository() {
        let (host, repo) = host_with_feature();

        let info = compare_local(&host, &repo, "main", "feature");

        assert!(info.is_same_repo());
        assert_eq!(info.meta.merge_base.as_str(), host.rev(&repo, "main"));
        assert_eq!(info.head_commit.as_str(), host.rev(&repo, "feature"));
        assert_eq!(info.meta.commits.len(), 2);
        assert_eq!(info.meta.commits[0].summary, "Change on feature");
        assert_eq!(info.meta.num_files, 2);

        match prepare_diff(&host.ctx, &info).await.unwrap() {
            CompareDiff::Diff(diff) => {
                assert_eq!(diff.num_files(), 2);
                assert!(!diff.is_incomplete);
            }
            other => panic!("expected a diff, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_utf8_content_still_diffs() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.commit_raw(&repo, Some("main"), "latin1", &[("latin1.txt", &b"caf\xe9\n"[..])]);
        host.push(&repo, "latin1");

        let info = compare_local(&host, &repo, "main", "latin1");

        match prepare_diff(&host.ctx, &info).await.unwrap() {
            CompareDiff::Diff(diff) => {
                assert_eq!(diff.num_files(), 1);
                assert_eq!(diff.files[0].name, "latin1.txt");
                assert_eq!(diff.files[0].additions, 1);
                assert!(!diff.is_incomplete);
            }
            other => panic!("expected a diff, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn head_at_merge_base_has_nothing_to_compare() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.work_git(&repo, &["branch", "behind", "main"]);
        host.push(&repo, "behind");

        let info = compare_local(&host, &repo, "main", "behind");

        assert!(info.meta.commits.is_empty());
        assert_eq!(
            prepare_diff(&host.ctx, &info).await.unwrap(),
            CompareDiff::NothingToCompare
        );
    }

    #[test]
    fn unrelated_histories_have_no_merge_base() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.work_git(&repo, &["checkout", "--orphan", "lonely"]);
        host.work_git(&repo, &["commit", "-m", "Unrelated root"]);
        host.push(&repo, "lonely");

        let err = parse_compare(
            &host.ctx,
            &repo,
            &branch("main"),
            &HeadRef::Local(branch("lonely")),
        )
        .unwrap_err();
        assert!(matches!(err, HostError::NoMergeBase { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn missing_head_branch() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");

        let err = parse_compare(
            &host.ctx,
            &repo,
            &branch("main"),
            &HeadRef::Local(branch("ghost")),
        )
        .unwrap_err();
        assert!(matches!(err, HostError::NotFound { what: "branch", .. }));
    }

    #[test]
    fn head_in_a_fork() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        let fork = host.fork(&repo, "bob/notes");
        host.commit(&repo, Some("main"), "fix", &[("fix.txt", "fixed\n")]);
        host.push_to(&repo, &fork, "fix");

        let head: HeadRef = "bob:notes:fix".parse().unwrap();
        let info = parse_compare(&host.ctx, &repo, &branch("main"), &head).unwrap();

        assert!(!info.is_same_repo());
        assert_eq!(info.head_repo, fork);
        assert_eq!(info.meta.commits.len(), 1);
        assert_eq!(info.meta.num_files, 1);
        // The base repository never received the branch itself.
        assert!(!host.has_branch(&repo, "fix"));
    }

    #[test]
    fn pull_info_of_deleted_head_is_none() {
        let (host, repo) = host_with_feature();
        let meta = pull_info(&host.ctx, &repo, &branch("main"), &repo, &branch("feature"))
            .unwrap()
            .unwrap();
        assert_eq!(meta.commits.len(), 2);

        run_git(&host.repo_path(&repo), &["branch", "-D", "feature"]);
        let gone = pull_info(&host.ctx, &repo, &branch("main"), &repo, &branch("feature")).unwrap();
        assert!(gone.is_none());
    }
}

// =============================================================================
// Mergeability
// =============================================================================

mod mergeability {
    use super::*;

    #[tokio::test]
    async fn clean_patch_is_mergeable_and_indices_increase() {
        let (host, repo) = host_with_feature();
        let info = compare_local(&host, &repo, "main", "feature");

        let (first, status) = test_mergeability(&host.ctx, &info).await.unwrap();
        assert_eq!(status, MergeStatus::Mergeable);
        assert_eq!(first.index, 1);
        assert_eq!(first.path, host.ctx.paths().patch_path(&repo, 1));
        assert!(first.path.is_file());

        let (second, _) = test_mergeability(&host.ctx, &info).await.unwrap();
        assert_eq!(second.index, 2);
    }

    #[tokio::test]
    async fn diverged_edits_conflict() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.commit(&repo, Some("main"), "feature", &[("README.md", "# Feature\n")]);
        host.push(&repo, "feature");
        host.commit(&repo, None, "main", &[("README.md", "# Main\n")]);
        host.push(&repo, "main");

        let info = compare_local(&host, &repo, "main", "feature");
        let (_, status) = test_mergeability(&host.ctx, &info).await.unwrap();

        assert_eq!(status, MergeStatus::Conflict);
    }

    #[tokio::test]
    async fn testing_leaves_base_and_local_copy_unchanged() {
        let (host, repo) = host_with_feature();
        let info = compare_local(&host, &repo, "main", "feature");
        let base_before = host.rev(&repo, "main");

        let (_, status) = test_mergeability(&host.ctx, &info).await.unwrap();
        assert_eq!(status, MergeStatus::Mergeable);

        assert_eq!(host.rev(&repo, "main"), base_before);
        let local = host.ctx.paths().local_copy_path(&repo);
        assert_eq!(run_git(&local, &["rev-parse", "HEAD"]), base_before);
        assert_eq!(run_git(&local, &["status", "--porcelain"]), "");
        assert!(!local.join("src/lib.rs").exists());
    }

    #[tokio::test]
    async fn ensure_mergeable_rejects_conflicts() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.commit(&repo, Some("main"), "feature", &[("README.md", "# Feature\n")]);
        host.push(&repo, "feature");
        let info = compare_local(&host, &repo, "main", "feature");
        assert!(ensure_mergeable(&host.ctx, &info).await.is_ok());

        host.commit(&repo, Some("feature~1"), "main", &[("README.md", "# Main\n")]);
        host.push(&repo, "main");
        let info = compare_local(&host, &repo, "main", "feature");

        let err = ensure_mergeable(&host.ctx, &info).await.unwrap_err();
        assert!(matches!(err, HostError::Conflict(_)));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn tampered_patch_is_a_conflict() {
        let (host, repo) = host_with_feature();
        let info = compare_local(&host, &repo, "main", "feature");
        let (patch, _) = test_mergeability(&host.ctx, &info).await.unwrap();

        std::fs::write(&patch.path, b"garbage").unwrap();

        let status = test_patch(&host.ctx, &repo, &branch("main"), &patch)
            .await
            .unwrap();
        assert_eq!(status, MergeStatus::Conflict);
    }
}

// =============================================================================
// Merge
// =============================================================================

mod merging {
    use super::*;

    fn temp_root_is_empty(host: &TestHost) -> bool {
        std::fs::read_dir(host.ctx.paths().merge_temp_root())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn regular_merge_creates_merge_commit() {
        let (host, repo) = host_with_feature();
        let base_before = host.rev(&repo, "main");
        let mut request = merge_request(&repo, "feature", MergeStyle::Regular);
        request.description = "Adds the library.".into();

        let tip = merge(&host.ctx, &request).await.unwrap();

        assert_eq!(host.rev(&repo, "main"), tip.as_str());
        assert_eq!(
            host.subject(&repo, "main"),
            "Merge branch 'feature' of alice/notes into main"
        );
        let parents = run_git(&host.repo_path(&repo), &["rev-list", "--parents", "-n", "1", "main"]);
        assert_eq!(parents.split_whitespace().count(), 3);
        let author = run_git(&host.repo_path(&repo), &["log", "-1", "--format=%an <%ae>", "main"]);
        assert_eq!(author, "Bob <bob@example.com>");
        assert!(host.read_file(&repo, "main", "src/lib.rs").is_some());
        assert!(temp_root_is_empty(&host));

        let merge_base = Oid::new(base_before).unwrap();
        let meta = merged_pull_info(&host.ctx, &repo, &merge_base, &tip).unwrap();
        assert_eq!(meta.num_files, 2);
    }

    #[tokio::test]
    async fn rebase_merge_is_linear() {
        let (host, repo) = host_with_feature();
        host.commit(&repo, None, "main", &[("main.txt", "main\n")]);
        host.push(&repo, "main");

        let tip = merge(&host.ctx, &merge_request(&repo, "feature", MergeStyle::Rebase))
            .await
            .unwrap();

        assert_eq!(host.rev(&repo, "main"), tip.as_str());
        let merges = run_git(&host.repo_path(&repo), &["rev-list", "--merges", "main"]);
        assert!(merges.is_empty());
        // Initial commit, the main commit and both rebased feature commits.
        let count = run_git(&host.repo_path(&repo), &["rev-list", "--count", "main"]);
        assert_eq!(count, "4");
        assert!(host.read_file(&repo, "main", "main.txt").is_some());
        assert!(host.read_file(&repo, "main", "docs/a.md").is_some());
        assert!(temp_root_is_empty(&host));
    }

    #[tokio::test]
    async fn conflicting_merge_leaves_base_untouched() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        host.commit(&repo, Some("main"), "feature", &[("README.md", "# Feature\n")]);
        host.push(&repo, "feature");
        host.commit(&repo, None, "main", &[("README.md", "# Main\n")]);
        host.push(&repo, "main");
        let before = host.rev(&repo, "main");

        let err = merge(&host.ctx, &merge_request(&repo, "feature", MergeStyle::Regular))
            .await
            .unwrap_err();

        assert!(matches!(err, HostError::Conflict(_)));
        assert_eq!(err.status_code(), 409);
        assert_eq!(host.rev(&repo, "main"), before);
        assert!(temp_root_is_empty(&host));
    }

    #[tokio::test]
    async fn merge_from_a_fork() {
        let host = TestHost::new();
        let repo = host.create_repo("alice/notes");
        let fork = host.fork(&repo, "bob/notes");
        host.commit(&repo, Some("main"), "fix", &[("fix.txt", "fixed\n")]);
        host.push_to(&repo, &fork, "fix");

        let request = MergeRequest {
            head_repo: fork.clone(),
            ..merge_request(&repo, "fix", MergeStyle::Regular)
        };
        merge(&host.ctx, &request).await.unwrap();

        assert_eq!(
            host.read_file(&repo, "main", "fix.txt").as_deref(),
            Some("fixed\n")
        );
        assert_eq!(
            host.subject(&repo, "main"),
            "Merge branch 'fix' of bob/notes into main"
        );
    }
}
