//! Integration tests for the build-then-run pipeline

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cibox_builder::*;
    use cibox_errors::{BuildError, Error};
    use cibox_events::{AppEvent, BuildEvent, GeneralEvent, RunEvent};
    use cibox_platform::{
        ContainerEngine, EngineProcess, ExitInfo, FileLister, OutputChunk, VolumeMount,
    };
    use cibox_types::{EnvVar, Job, JobSpec, ProjectFile, ScriptPhases};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Scripted engine output for one invocation
    #[derive(Clone, Default)]
    struct Script {
        chunks: Vec<OutputChunk>,
        exit_code: Option<i32>,
        hang: bool,
    }

    impl Script {
        fn exits(code: i32, chunks: Vec<OutputChunk>) -> Self {
            Self {
                chunks,
                exit_code: Some(code),
                hang: false,
            }
        }
    }

    struct FakeProcess {
        chunks: VecDeque<OutputChunk>,
        exit_code: Option<i32>,
        hang: bool,
        killed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EngineProcess for FakeProcess {
        async fn next_chunk(&mut self) -> Option<OutputChunk> {
            if let Some(chunk) = self.chunks.pop_front() {
                return Some(chunk);
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            None
        }

        async fn wait(&mut self) -> Result<ExitInfo, Error> {
            Ok(ExitInfo::new(self.exit_code))
        }

        async fn kill(&mut self) -> Result<(), Error> {
            self.killed.store(true, Ordering::SeqCst);
            self.exit_code = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        build_script: Script,
        run_script: Script,
        builds: Mutex<Vec<(String, PathBuf)>>,
        runs: Mutex<Vec<(String, String, Vec<VolumeMount>)>>,
        removed: Mutex<Vec<String>>,
        remove_fails: bool,
        killed: Arc<AtomicBool>,
    }

    impl FakeEngine {
        fn process(&self, script: &Script) -> Box<dyn EngineProcess> {
            Box::new(FakeProcess {
                chunks: script.chunks.iter().cloned().collect(),
                exit_code: script.exit_code,
                hang: script.hang,
                killed: self.killed.clone(),
            })
        }
    }

    #[async_trait]
    impl ContainerEngine for FakeEngine {
        async fn build(
            &self,
            tag: &str,
            descriptor: &Path,
        ) -> Result<Box<dyn EngineProcess>, Error> {
            self.builds
                .lock()
                .unwrap()
                .push((tag.to_string(), descriptor.to_path_buf()));
            Ok(self.process(&self.build_script))
        }

        async fn run(
            &self,
            image: &str,
            name: &str,
            volumes: &[VolumeMount],
        ) -> Result<Box<dyn EngineProcess>, Error> {
            self.runs
                .lock()
                .unwrap()
                .push((image.to_string(), name.to_string(), volumes.to_vec()));
            Ok(self.process(&self.run_script))
        }

        async fn remove(&self, name: &str) -> Result<(), Error> {
            if self.remove_fails {
                return Err(Error::internal("daemon not reachable"));
            }
            self.removed.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    /// Lists a fixed set of relative paths
    struct FakeLister {
        entries: Vec<&'static str>,
    }

    #[async_trait]
    impl FileLister for FakeLister {
        async fn list_tracked_files(&self, dir: &Path) -> Result<Vec<ProjectFile>, Error> {
            Ok(self
                .entries
                .iter()
                .map(|rel| ProjectFile::new(dir, *rel, dir.join(rel).is_dir()))
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingProgress {
        fn update(&self, current: usize, total: usize, label: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {current}/{total} {label}"));
        }

        fn finish(&self, total: usize) {
            self.calls.lock().unwrap().push(format!("finish {total}"));
        }

        fn abandon(&self) {
            self.calls.lock().unwrap().push("abandon".to_string());
        }

        fn banner(&self, message: &str, success: bool) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("banner {success} {message}"));
        }
    }

    #[derive(Default)]
    struct RecordingRelay {
        chunks: Mutex<Vec<OutputChunk>>,
    }

    impl OutputRelay for RecordingRelay {
        fn relay(&self, chunk: &OutputChunk) -> Result<(), Error> {
            self.chunks.lock().unwrap().push(chunk.clone());
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        project: PathBuf,
        temp_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let project = temp.path().join("demo");
        std::fs::create_dir_all(project.join(".git")).unwrap();
        std::fs::create_dir_all(project.join("lib/nested")).unwrap();
        std::fs::write(project.join("index.php"), "<?php echo 'hi';").unwrap();
        std::fs::write(project.join("lib/nested/a.php"), "<?php").unwrap();
        std::fs::write(project.join("composer.lock"), "{}").unwrap();
        let temp_root = temp.path().join("scratch");
        Fixture {
            _temp: temp,
            project,
            temp_root,
        }
    }

    fn demo_job(project: &Path) -> Job {
        Job::validate(JobSpec {
            project_dir: project.to_path_buf(),
            project_name: Some("Demo".to_string()),
            runtime_version: Some("8.1".to_string()),
            env: vec![EnvVar::new("FOO", "bar")],
            phases: ScriptPhases {
                run: vec!["echo hi".to_string()],
                ..ScriptPhases::default()
            },
            id: Some("7".to_string()),
        })
        .unwrap()
    }

    fn lister() -> Arc<FakeLister> {
        Arc::new(FakeLister {
            entries: vec!["index.php", "lib"],
        })
    }

    fn config(temp_root: &Path) -> PipelineConfig {
        PipelineConfig {
            temp_root: temp_root.to_path_buf(),
            base_image: "travisci/php".to_string(),
            show_output: false,
            label_width: 76,
        }
    }

    fn build_chunks() -> Vec<OutputChunk> {
        vec![
            OutputChunk::stdout("Sending build context to Docker daemon\n"),
            OutputChunk::stdout("Step 1/6 : FROM travisci/php:8.1\n ---> abc\n"),
            OutputChunk::stdout("Step 2/6 : ENV FOO bar\n"),
            OutputChunk::stderr("some warning\n"),
            OutputChunk::stdout("Step 3/"),
            OutputChunk::stdout("6 : COPY src /build\n"),
            OutputChunk::stdout("Step 2/6 : ENV FOO bar\n"),
            OutputChunk::stdout("Step 4/9 : bogus\n"),
            OutputChunk::stdout("Successfully tagged demo:v7"),
        ]
    }

    struct Harness {
        engine: Arc<FakeEngine>,
        progress: Arc<RecordingProgress>,
        relay: Arc<RecordingRelay>,
        orchestrator: Orchestrator,
    }

    fn harness(temp_root: &Path, engine: FakeEngine, show_output: bool) -> Harness {
        let engine = Arc::new(engine);
        let progress = Arc::new(RecordingProgress::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut config = config(temp_root);
        config.show_output = show_output;
        let orchestrator = Orchestrator::new(engine.clone(), lister(), config)
            .unwrap()
            .with_progress(progress.clone())
            .with_relay(relay.clone());
        Harness {
            engine,
            progress,
            relay,
            orchestrator,
        }
    }

    #[test]
    fn test_descriptor_and_entrypoint_for_demo_job() {
        let fx = fixture();
        let job = demo_job(&fx.project);

        let lines = render_descriptor(&job, &job.entrypoint_filename(), "travisci/php");
        assert_eq!(
            lines,
            vec![
                "FROM travisci/php:8.1",
                "ENV FOO bar",
                "COPY src /build",
                "WORKDIR /build",
                "COPY entrypoint-7.sh /usr/local/bin/cibox-entrypoint",
                "CMD [\"/usr/local/bin/cibox-entrypoint\"]",
            ]
        );

        let script = render_entrypoint(&job);
        assert_eq!(script, "#!/bin/bash\nset -e\necho '> echo hi'\necho hi\n");
        assert_eq!(job.image_tag(), "demo:v7");
    }

    #[test]
    fn test_descriptor_phase_order() {
        let fx = fixture();
        let mut spec = JobSpec {
            project_dir: fx.project.clone(),
            project_name: None,
            runtime_version: Some("7.4".to_string()),
            env: Vec::new(),
            phases: ScriptPhases {
                before_install: vec!["a".to_string()],
                install: vec!["b".to_string(), "c".to_string()],
                before: vec!["d".to_string()],
                run: vec!["phpunit".to_string()],
            },
            id: Some("1".to_string()),
        };
        spec.env.push(EnvVar::new("X", "1"));
        let job = Job::validate(spec).unwrap();

        let lines = render_descriptor(&job, &job.entrypoint_filename(), "php");
        assert_eq!(lines[0], "FROM php:7.4");
        assert_eq!(lines[1], "ENV X 1");
        assert_eq!(&lines[4..8], ["RUN a", "RUN b", "RUN c", "RUN d"]);
        assert_eq!(lines.len(), 10);
    }

    #[tokio::test]
    async fn test_descriptor_file_has_one_line_per_step() {
        let fx = fixture();
        let job = Job::validate(JobSpec {
            project_dir: fx.project.clone(),
            project_name: Some("Demo".to_string()),
            runtime_version: Some("8.1".to_string()),
            env: vec![
                EnvVar::new("EMPTY", ""),
                EnvVar::new("QUOTED", "say \"hi\" to $USER"),
            ],
            phases: ScriptPhases {
                install: vec!["composer install".to_string()],
                run: vec!["phpunit".to_string()],
                ..ScriptPhases::default()
            },
            id: Some("3".to_string()),
        })
        .unwrap();

        let context = BuildContext::for_job(&fx.temp_root, &job);
        std::fs::create_dir_all(context.root()).unwrap();
        let lines = write_descriptor(&context, &job, "travisci/php").await.unwrap();
        let written = std::fs::read_to_string(context.descriptor_path()).unwrap();

        assert_eq!(written.lines().count(), lines.len());
        assert_eq!(lines[1], r#"ENV EMPTY="""#);
        assert_eq!(lines[2], r#"ENV QUOTED="say \"hi\" to \$USER""#);
    }

    #[test]
    fn test_multiline_env_value_never_reaches_descriptor() {
        let fx = fixture();
        let result = Job::validate(JobSpec {
            project_dir: fx.project.clone(),
            runtime_version: Some("8.1".to_string()),
            env: vec![EnvVar::new("FOO", "a\nRUN touch /injected")],
            phases: ScriptPhases {
                run: vec!["phpunit".to_string()],
                ..ScriptPhases::default()
            },
            ..JobSpec::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_stage_mirrors_listed_files() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let stager = WorkspaceStager::new(lister(), &fx.temp_root);

        let files = stager.list_project_files(job.project_dir()).await.unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("index.php"),
                PathBuf::from("lib"),
                PathBuf::from("composer.lock")
            ]
        );

        let context = stager.stage(&job).await.unwrap();
        assert_eq!(context.root(), fx.temp_root.join("demo"));
        assert_eq!(context.staged_files(), 3);
        let src = context.source_dir();
        assert!(src.join("index.php").is_file());
        assert!(src.join("lib/nested/a.php").is_file());
        assert!(src.join("composer.lock").is_file());
        assert!(!src.join(".git").exists());
        assert_eq!(
            std::fs::read_to_string(context.ignore_file_path()).unwrap(),
            "src/.git\nsrc/vendor\n"
        );

        // Restaging removes files that are no longer listed
        std::fs::write(src.join("stale.php"), "old").unwrap();
        let again = stager.stage(&job).await.unwrap();
        assert_eq!(again, context);
        assert!(!src.join("stale.php").exists());
        assert!(src.join("index.php").is_file());
    }

    #[tokio::test]
    async fn test_lockfile_not_duplicated() {
        let fx = fixture();
        let stager = WorkspaceStager::new(
            Arc::new(FakeLister {
                entries: vec!["composer.lock", "index.php"],
            }),
            &fx.temp_root,
        );
        let files = stager.list_project_files(&fx.project).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_demo_job() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let engine = FakeEngine {
            build_script: Script::exits(0, build_chunks()),
            run_script: Script::exits(
                0,
                vec![
                    OutputChunk::stdout("> echo hi\n"),
                    OutputChunk::stderr("notice\n"),
                    OutputChunk::stdout("hi\n"),
                ],
            ),
            ..FakeEngine::default()
        };
        let (tx, mut rx) = cibox_events::channel();
        let h = harness(&fx.temp_root, engine, false);
        let orchestrator = h.orchestrator.with_event_sender(tx);

        let report = orchestrator.execute(&job).await.unwrap();
        assert_eq!(report.image_tag, "demo:v7");
        assert_eq!(report.job_id, "7");
        assert_eq!(report.total_steps, 6);
        assert!(report.run.success());

        // Generated files
        let context_dir = fx.temp_root.join("demo");
        let descriptor = std::fs::read_to_string(context_dir.join("Dockerfile.7")).unwrap();
        assert!(descriptor.contains("FROM travisci/php:8.1\n"));
        assert!(descriptor.contains("ENV FOO bar\n"));
        assert!(descriptor.contains("COPY entrypoint-7.sh /usr/local/bin/cibox-entrypoint\n"));
        let entrypoint = std::fs::read_to_string(context_dir.join("entrypoint-7.sh")).unwrap();
        assert!(entrypoint.contains("echo '> echo hi'\necho hi\n"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(context_dir.join("entrypoint-7.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        // Engine calls
        let builds = h.engine.builds.lock().unwrap().clone();
        assert_eq!(
            builds,
            vec![("demo:v7".to_string(), context_dir.join("Dockerfile.7"))]
        );
        let runs = h.engine.runs.lock().unwrap().clone();
        assert_eq!(runs.len(), 1);
        let (image, container, volumes) = &runs[0];
        assert_eq!(image, "demo:v7");
        assert_eq!(container, "cibox-demo-7");
        assert_eq!(
            volumes[0],
            VolumeMount::new(job.project_dir().join("index.php"), "/build/index.php")
        );
        assert_eq!(volumes[1].container, "/build/lib");
        assert_eq!(volumes[2].container, "/build/composer.lock");

        // Progress: markers advance, duplicates and foreign totals are ignored
        let calls = h.progress.calls();
        assert_eq!(
            &calls[..4],
            [
                "update 1/6 ENV FOO bar",
                "update 2/6 COPY src /build",
                "update 3/6 WORKDIR /build",
                "finish 6",
            ]
        );
        assert!(calls[4].starts_with("banner true Image demo:v7 built"));
        assert_eq!(calls[5], "banner true Job succeeded");

        // Only run output is relayed when build output is hidden
        let relayed = h.relay.chunks.lock().unwrap().clone();
        assert_eq!(relayed.len(), 3);
        assert_eq!(relayed[1], OutputChunk::stderr("notice\n"));

        drop(orchestrator);
        let mut saw_staged = false;
        let mut saw_run_completed = false;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Build(BuildEvent::WorkspaceStaged { files, .. }) => {
                    assert_eq!(files, 3);
                    saw_staged = true;
                }
                AppEvent::Run(RunEvent::Completed { exit_code, .. }) => {
                    assert_eq!(exit_code, Some(0));
                    saw_run_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_staged && saw_run_completed);
    }

    #[tokio::test]
    async fn test_build_failure_skips_run() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let engine = FakeEngine {
            build_script: Script::exits(
                1,
                vec![
                    OutputChunk::stdout("Step 1/6 : FROM travisci/php:8.1\n"),
                    OutputChunk::stderr("manifest unknown\n"),
                ],
            ),
            run_script: Script::exits(0, Vec::new()),
            ..FakeEngine::default()
        };
        let h = harness(&fx.temp_root, engine, false);

        let err = h.orchestrator.execute(&job).await.unwrap_err();
        match err {
            Error::Build(BuildError::ImageBuildFailed {
                tag,
                exit_code,
                output,
            }) => {
                assert_eq!(tag, "demo:v7");
                assert_eq!(exit_code, Some(1));
                assert!(output.contains("manifest unknown"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(h.engine.runs.lock().unwrap().is_empty());
        let calls = h.progress.calls();
        assert!(calls.contains(&"abandon".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("finish")));
        assert_eq!(
            calls.last().map(String::as_str),
            Some("banner false Image build failed: demo:v7")
        );
    }

    #[tokio::test]
    async fn test_failed_run_is_an_outcome() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let engine = FakeEngine {
            build_script: Script::exits(0, Vec::new()),
            run_script: Script::exits(3, vec![OutputChunk::stderr("tests failed\n")]),
            ..FakeEngine::default()
        };
        let h = harness(&fx.temp_root, engine, false);

        let outcome = h.orchestrator.run_image(&job, "demo:v7").await.unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, Some(3));

        let report = h.orchestrator.execute(&job).await.unwrap();
        assert_eq!(report.run.process_exit_code(), 3);
        assert_eq!(
            h.progress.calls().last().map(String::as_str),
            Some("banner false Job failed (exit 3)")
        );
    }

    #[tokio::test]
    async fn test_verbose_build_relays_raw_chunks() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let engine = FakeEngine {
            build_script: Script::exits(0, build_chunks()),
            ..FakeEngine::default()
        };
        let h = harness(&fx.temp_root, engine, true);

        let build = h.orchestrator.build_image(&job).await.unwrap();
        assert_eq!(build.tag, "demo:v7");
        assert_eq!(build.total_steps, 6);
        assert_eq!(*h.relay.chunks.lock().unwrap(), build_chunks());
    }

    #[tokio::test]
    async fn test_cancellation_kills_build() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let engine = FakeEngine {
            build_script: Script {
                chunks: vec![OutputChunk::stdout("Step 1/6 : FROM x\n")],
                exit_code: Some(0),
                hang: true,
            },
            ..FakeEngine::default()
        };
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let h = harness(&fx.temp_root, engine, false);
        let orchestrator = h.orchestrator.with_cancellation(cancel_rx);

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
            cancel_tx
        });

        let err = orchestrator.execute(&job).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(h.engine.killed.load(Ordering::SeqCst));
        assert!(h.engine.runs.lock().unwrap().is_empty());
        assert!(h.engine.removed.lock().unwrap().is_empty());
        let calls = h.progress.calls();
        assert_eq!(calls.last().map(String::as_str), Some("abandon"));
        drop(trigger.await.unwrap());
    }

    fn hanging_run_engine(remove_fails: bool) -> FakeEngine {
        FakeEngine {
            build_script: Script::exits(0, Vec::new()),
            run_script: Script {
                chunks: vec![OutputChunk::stdout("> phpunit\n")],
                exit_code: Some(0),
                hang: true,
            },
            remove_fails,
            ..FakeEngine::default()
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_removes_container() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let (tx, mut rx) = cibox_events::channel();
        let h = harness(&fx.temp_root, hanging_run_engine(false), false);
        let orchestrator = h
            .orchestrator
            .with_cancellation(cancel_rx)
            .with_event_sender(tx);

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
            cancel_tx
        });

        let err = orchestrator.execute(&job).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(h.engine.killed.load(Ordering::SeqCst));
        assert_eq!(*h.engine.removed.lock().unwrap(), vec!["cibox-demo-7"]);

        drop(orchestrator);
        drop(trigger.await.unwrap());
        let mut saw_removed = false;
        while let Some(event) = rx.recv().await {
            if let AppEvent::Run(RunEvent::ContainerRemoved { container, .. }) = event {
                assert_eq!(container, "cibox-demo-7");
                saw_removed = true;
            }
        }
        assert!(saw_removed);
    }

    #[tokio::test]
    async fn test_failed_container_removal_is_a_warning() {
        let fx = fixture();
        let job = demo_job(&fx.project);
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let (tx, mut rx) = cibox_events::channel();
        let h = harness(&fx.temp_root, hanging_run_engine(true), false);
        let orchestrator = h
            .orchestrator
            .with_cancellation(cancel_rx)
            .with_event_sender(tx);

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
            cancel_tx
        });

        let err = orchestrator.run_image(&job, "demo:v7").await.unwrap_err();
        assert!(err.is_cancelled());

        drop(orchestrator);
        drop(trigger.await.unwrap());
        let mut warning = None;
        while let Some(event) = rx.recv().await {
            if let AppEvent::General(GeneralEvent::Warning { message, context }) = event {
                warning = Some((message, context));
            }
        }
        let (message, context) = warning.unwrap();
        assert_eq!(message, "failed to remove container cibox-demo-7");
        assert!(context.unwrap().contains("daemon not reachable"));
    }
}
