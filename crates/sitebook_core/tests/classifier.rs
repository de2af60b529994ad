use sitebook_core::{resolve_reference, Classifier, Frontier, History, IgnoreSet, Verdict};

const PREFIX: &str = "https://site.test";

fn check(classifier: &Classifier, candidate: &str, ignore: &IgnoreSet, history: &History, frontier: &Frontier) -> Verdict {
    let resolved = resolve_reference(PREFIX, candidate);
    classifier.classify(candidate, &resolved, ignore, history, frontier)
}

#[test]
fn relative_reference_is_eligible_on_an_empty_crawl() {
    let classifier = Classifier::default();
    let verdict = check(
        &classifier,
        "/spells",
        &IgnoreSet::empty(),
        &History::new(),
        &Frontier::new(),
    );
    assert_eq!(verdict, Verdict::Eligible);
}

#[test]
fn ignore_matches_relative_or_resolved_form() {
    let classifier = Classifier::default();
    let ignore = IgnoreSet::parse(["/monsters", "https://site.test/changelog"]).unwrap();
    let empty_h = History::new();
    let empty_f = Frontier::new();

    assert_eq!(check(&classifier, "/monsters", &ignore, &empty_h, &empty_f), Verdict::Ignored);
    assert_eq!(check(&classifier, "/changelog", &ignore, &empty_h, &empty_f), Verdict::Ignored);
}

#[test]
fn visited_and_queued_urls_are_rejected() {
    let classifier = Classifier::default();
    let mut history = History::new();
    history.record("https://site.test/a");
    let mut frontier = Frontier::new();
    frontier.push_front("https://site.test/b");

    assert_eq!(
        check(&classifier, "/a", &IgnoreSet::empty(), &history, &frontier),
        Verdict::AlreadyVisited
    );
    assert_eq!(
        check(&classifier, "/b", &IgnoreSet::empty(), &history, &frontier),
        Verdict::AlreadyQueued
    );
}

#[test]
fn external_and_fragment_references_are_rejected() {
    let classifier = Classifier::default();
    let (ignore, history, frontier) = (IgnoreSet::empty(), History::new(), Frontier::new());

    assert_eq!(
        check(&classifier, "https://other.test/x", &ignore, &history, &frontier),
        Verdict::External
    );
    assert_eq!(
        check(&classifier, "/page#anchor", &ignore, &history, &frontier),
        Verdict::Fragment
    );
    assert!(!classifier.is_eligible("#top", "https://site.test#top", &ignore, &history, &frontier));
}

#[test]
fn custom_external_marker_is_honoured() {
    let classifier = Classifier::new("://");
    let verdict = check(
        &classifier,
        "/http-status-codes",
        &IgnoreSet::empty(),
        &History::new(),
        &Frontier::new(),
    );
    assert_eq!(verdict, Verdict::Eligible);
}
