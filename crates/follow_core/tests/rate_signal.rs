use follow_core::RateSignalMonitor;

#[test]
fn detects_markers_case_insensitively() {
    let monitor = RateSignalMonitor::default();
    assert!(monitor.detect("<h1>Action Blocked</h1><p>Try Again Later</p>"));
    assert_eq!(
        monitor.matched("{\"message\":\"Please slow down.\"}"),
        Some("please slow down")
    );
}

#[test]
fn ordinary_content_is_not_a_signal() {
    let monitor = RateSignalMonitor::default();
    assert!(!monitor.detect(""));
    assert!(!monitor.detect("{\"status\":\"ok\",\"users\":[]}"));
    assert!(!monitor.detect("Please wait while we load your feed"));
}

#[test]
fn single_word_markers_are_dropped() {
    let monitor = RateSignalMonitor::with_markers(["blocked", "  Too Many Requests "]);
    assert_eq!(monitor.markers(), ["too many requests".to_string()]);
    assert!(!monitor.detect("you are blocked"));
    assert!(monitor.detect("429 TOO MANY REQUESTS"));
}
