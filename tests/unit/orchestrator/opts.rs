use super::*;

#[test]
fn defaults_are_valid() {
    let opts = OrchestratorOpts::default();
    opts.validate().unwrap();
    assert_eq!(opts.worker_count, 1);
    assert_eq!(opts.frame_delay(), Duration::from_millis(1));
    assert_eq!(opts.render_timeout(), None);
    assert!(opts.concurrency().get() >= 1);
}

#[test]
fn explicit_concurrency_wins() {
    let opts = OrchestratorOpts {
        concurrency: Some(3),
        ..OrchestratorOpts::default()
    };
    assert_eq!(opts.concurrency().get(), 3);
}

#[test]
fn partial_json_fills_in_defaults() {
    let json = br#"{ "worker_count": 2, "render_timeout_ms": 500 }"#;
    let opts = OrchestratorOpts::from_reader(json.as_slice()).unwrap();
    assert_eq!(opts.worker_count, 2);
    assert_eq!(opts.render_timeout(), Some(Duration::from_millis(500)));
    assert_eq!(opts.max_restarts, OrchestratorOpts::default().max_restarts);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = OrchestratorOpts::from_reader(br#"{ "workers": 2 }"#.as_slice()).unwrap_err();
    assert!(err.to_string().contains("parse orchestrator config"), "{err}");
}

#[test]
fn validate_rejects_unusable_settings() {
    let cases = [
        OrchestratorOpts {
            worker_count: 0,
            ..OrchestratorOpts::default()
        },
        OrchestratorOpts {
            concurrency: Some(0),
            ..OrchestratorOpts::default()
        },
        OrchestratorOpts {
            render_timeout_ms: Some(0),
            ..OrchestratorOpts::default()
        },
        OrchestratorOpts {
            memory_pages: 0,
            ..OrchestratorOpts::default()
        },
        OrchestratorOpts {
            memory_pages: crate::memory::MAX_PAGES + 1,
            ..OrchestratorOpts::default()
        },
    ];
    for opts in cases {
        let err = opts.validate().unwrap_err();
        assert!(matches!(err, RayportError::Validation(_)), "{opts:?}: {err}");
    }
}

#[test]
fn invalid_json_values_fail_validation_on_load() {
    let err = OrchestratorOpts::from_reader(br#"{ "worker_count": 0 }"#.as_slice()).unwrap_err();
    assert!(err.to_string().contains("worker_count"), "{err}");
}

#[test]
fn fit_frame_grows_memory_but_never_shrinks_it() {
    let mut opts = OrchestratorOpts::default();
    opts.fit_frame(&RenderRequest::demo(640, 480)).unwrap();
    assert_eq!(opts.memory_pages, DEFAULT_PAGES);

    opts.fit_frame(&RenderRequest::demo(3840, 2160)).unwrap();
    assert_eq!(opts.memory_pages, 507);
    opts.validate().unwrap();

    opts.fit_frame(&RenderRequest::demo(8, 8)).unwrap();
    assert_eq!(opts.memory_pages, 507);

    let err = opts
        .fit_frame(&RenderRequest::demo(100_000, 100_000))
        .unwrap_err();
    assert!(matches!(err, RayportError::Validation(_)));
    assert_eq!(opts.memory_pages, 507);
}
