mod support;

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sitebook_engine::{
    prepare, run, Checkpoint, Collaborators, Compilation, HttpSessionFactory, MarkdownConverter,
    PageFailurePolicy, PipelineError, SiteConfig,
};
use support::{page, test_config, url, CountingFetcher, FakeSite, SEED};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// S links /a and /b, /b links /c. Every page also links back home and out.
fn site() -> CountingFetcher {
    CountingFetcher::new()
        .with_page(
            SEED,
            page(
                "Home",
                r#"<h1>Home page</h1><a href="/a">A</a><a href="/b">B</a><a href="/5e">self</a>"#,
            ),
        )
        .with_page(
            url("/a"),
            page("A", r##"<h1>Page A</h1><a href="/5e">home</a><a href="#top">top</a>"##),
        )
        .with_page(
            url("/b"),
            page(
                "B",
                r#"<h1>Page B</h1><a href="/c">C</a><a href="https://elsewhere.test/x">out</a>"#,
            ),
        )
        .with_page(url("/c"), page("C", r#"<h1>Page C</h1><img src="/img/c.png">"#))
        .with(url("/img/c.png"), b"PNG".to_vec(), Some("image/png"))
}

fn collaborators(fetcher: Arc<CountingFetcher>) -> Collaborators {
    Collaborators {
        sessions: Arc::new(HttpSessionFactory::with_fetcher(fetcher.clone())),
        asset_fetcher: fetcher,
        converter: Arc::new(MarkdownConverter::default()),
    }
}

async fn run_with(config: SiteConfig, fetcher: Arc<CountingFetcher>) -> sitebook_engine::RunReport {
    engine_logging::initialize_for_tests();
    let prepared = prepare(config, collaborators(fetcher), CancellationToken::new())
        .await
        .unwrap();
    run(prepared).await.unwrap()
}

#[tokio::test]
async fn crawl_visits_depth_first_and_compiles_in_order() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(site());

    let report = run_with(test_config(temp.path()), fetcher.clone()).await;

    assert_eq!(report.visited, vec![SEED.to_string(), url("/a"), url("/b"), url("/c")]);
    assert!(report.failed.is_empty());
    assert_eq!(fetcher.count(&url("/img/c.png")), 1);
    assert_eq!(fetcher.count("https://elsewhere.test/x"), 0);

    let summary = report.compiled().expect("compiled");
    assert_eq!(summary.page_count, 4);
    assert_eq!(
        summary.output_path,
        temp.path().join("SITE_v1.0").join("SITE_v1.0_compiled.md")
    );
    let compiled = fs::read_to_string(&summary.output_path).unwrap();
    let positions: Vec<usize> = ["Home page", "Page A", "Page B", "Page C"]
        .iter()
        .map(|needle| compiled.find(needle).expect(needle))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let root = temp.path().join("SITE_v1.0");
    assert!(root.join("manifest.json").is_file());
    assert!(root.join("checkpoint.ron").is_file());
    assert!(root.join("html").join("SITE.html").is_file());
    assert!(root.join("html").join("static").join("site.test").join("img").join("c.png").is_file());
}

#[tokio::test]
async fn ignored_page_cuts_its_subtree() {
    let temp = TempDir::new().unwrap();
    let config = SiteConfig {
        ignore_list: vec!["/b".to_string()],
        ..test_config(temp.path())
    };

    let report = run_with(config, Arc::new(site())).await;

    assert_eq!(report.visited, vec![SEED.to_string(), url("/a")]);
    assert_eq!(report.compiled().map(|s| s.page_count), Some(2));
}

#[tokio::test]
async fn failed_page_is_skipped_and_reported_as_missing_artifact() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(
        CountingFetcher::new()
            .with_page(SEED, page("Home", r#"<a href="/a">A</a><a href="/gone">G</a>"#))
            .with_page(url("/a"), page("A", "<p>a</p>")),
    );

    let report = run_with(test_config(temp.path()), fetcher.clone()).await;

    assert_eq!(report.visited, vec![SEED.to_string(), url("/a"), url("/gone")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, url("/gone"));
    // navigation is retried exactly once
    assert_eq!(fetcher.count(&url("/gone")), 2);
    assert!(matches!(report.compilation, Compilation::Failed(_)));
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].url, url("/gone"));
}

#[tokio::test]
async fn aborted_crawl_resumes_from_checkpoint() {
    let temp = TempDir::new().unwrap();
    let broken = Arc::new(
        CountingFetcher::new()
            .with_page(SEED, page("Home", r#"<h1>Home page</h1><a href="/a">A</a><a href="/b">B</a>"#))
            .with_page(url("/a"), page("A", "<h1>Page A</h1>")),
    );
    let config = SiteConfig {
        on_page_failure: PageFailurePolicy::Abort,
        ..test_config(temp.path())
    };

    let first = run_with(config.clone(), broken).await;
    assert!(matches!(first.compilation, Compilation::Skipped(_)));
    assert_eq!(first.failed.len(), 1);
    let root = temp.path().join("SITE_v1.0");
    let saved = Checkpoint::load(&root.join("checkpoint.ron")).unwrap().unwrap();
    assert_eq!(saved.crawl.frontier, vec![url("/b")]);

    let fixed = Arc::new(site());
    let resumed = run_with(SiteConfig { resume: true, ..config }, fixed.clone()).await;

    assert_eq!(resumed.visited, vec![SEED.to_string(), url("/a"), url("/b"), url("/c")]);
    assert_eq!(fixed.count(SEED), 0);
    assert_eq!(fixed.count(&url("/a")), 0);
    assert_eq!(resumed.compiled().map(|s| s.page_count), Some(4));
}

#[tokio::test]
async fn version_is_read_from_changelog_when_not_configured() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(site().with_page(url("/changelog"), page("Changes", "<h1> 2.3 </h1><h1>2.2</h1>")));
    let config = SiteConfig {
        version: None,
        changelog_url: Some(url("/changelog")),
        ..test_config(temp.path())
    };

    let prepared = prepare(config, collaborators(fetcher), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(prepared.layout().identifier(), "SITE_v2.3");
    assert!(temp.path().join("SITE_v2.3").join("pages").is_dir());
}

#[tokio::test]
async fn missing_version_source_is_a_pipeline_error() {
    let temp = TempDir::new().unwrap();
    let config = SiteConfig {
        version: None,
        ..test_config(temp.path())
    };

    let result = prepare(config, collaborators(Arc::new(site())), CancellationToken::new()).await;

    assert!(matches!(result, Err(PipelineError::Version(_))));
}

#[tokio::test]
async fn cancelled_run_exports_nothing_and_keeps_frontier() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(site());
    let cancel = CancellationToken::new();
    let prepared = prepare(test_config(temp.path()), collaborators(fetcher.clone()), cancel.clone())
        .await
        .unwrap();
    cancel.cancel();

    let report = run(prepared).await.unwrap();

    assert_eq!(report.exported, 0);
    assert!(matches!(report.compilation, Compilation::Skipped(_)));
    assert_eq!(fetcher.count(SEED), 0);
    let saved = Checkpoint::load(&temp.path().join("SITE_v1.0").join("checkpoint.ron"))
        .unwrap()
        .unwrap();
    assert_eq!(saved.crawl.frontier, vec![SEED.to_string()]);
}

#[tokio::test]
async fn startup_clicks_happen_once_on_the_seed_page() {
    let temp = TempDir::new().unwrap();
    let (factory, journal) = FakeSite::new()
        .page(SEED, page("Home", r#"<button id="settings">s</button>"#))
        .factory();
    let collaborators = Collaborators {
        sessions: factory,
        asset_fetcher: Arc::new(CountingFetcher::new()),
        converter: Arc::new(MarkdownConverter::default()),
    };
    let config = SiteConfig {
        startup_clicks: vec!["settings".to_string(), "absent".to_string()],
        ..test_config(temp.path())
    };

    let prepared = prepare(config, collaborators, CancellationToken::new()).await.unwrap();
    let report = run(prepared).await.unwrap();

    assert_eq!(report.visited, vec![SEED.to_string()]);
    let journal = journal.lock().unwrap();
    assert_eq!(journal.clicks, vec!["settings"]);
    assert_eq!(journal.navigations, vec![SEED, SEED]);
}

#[tokio::test]
async fn content_can_be_dropped_after_the_crawl() {
    let temp = TempDir::new().unwrap();
    let config = SiteConfig {
        keep_content: false,
        keep_artifacts: false,
        ..test_config(temp.path())
    };

    let report = run_with(config, Arc::new(site())).await;

    let root = temp.path().join("SITE_v1.0");
    assert!(report.compiled().is_some());
    assert!(!root.join("html").exists());
    assert!(!root.join("pages").exists());
    assert!(root.join("SITE_v1.0_compiled.md").is_file());
}

#[tokio::test]
async fn site_stylesheets_land_in_every_page_head() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(site().with(url("/css/site.css"), b"h1{font-size:2em}".to_vec(), Some("text/css")));
    let config = SiteConfig {
        stylesheets: vec!["/css/site.css".to_string(), "/css/missing.css".to_string()],
        ..test_config(temp.path())
    };

    let report = run_with(config, fetcher.clone()).await;

    assert!(report.compiled().is_some());
    assert_eq!(fetcher.count(&url("/css/site.css")), 1);
    assert_eq!(fetcher.count(&url("/css/missing.css")), 1);
    let html_dir = temp.path().join("SITE_v1.0").join("html");
    let pages: Vec<_> = fs::read_dir(&html_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    assert_eq!(pages.len(), 4);
    for path in pages {
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("h1{font-size:2em}"), "{} lacks the site stylesheet", path.display());
    }
    assert!(html_dir
        .join("static")
        .join("site.test")
        .join("css")
        .join("site.css")
        .is_file());
}
