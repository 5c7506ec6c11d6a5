//! Integration tests for events

#[cfg(test)]
mod tests {
    use cibox_errors::BuildError;
    use cibox_events::*;
    use std::time::Duration;

    struct Stage {
        sender: Option<EventSender>,
    }

    impl EventEmitter for Stage {
        fn event_sender(&self) -> Option<&EventSender> {
            self.sender.as_ref()
        }
    }

    #[tokio::test]
    async fn test_emitter_struct_forwards_events() {
        let (tx, mut rx) = channel();
        let stage = Stage { sender: Some(tx) };

        stage.emit_operation_completed("run demo:v7", true);
        stage.emit(AppEvent::Build(BuildEvent::Completed {
            job_id: "7".into(),
            image_tag: "demo:v7".into(),
            duration: Duration::from_millis(1500),
        }));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(
            event1,
            AppEvent::General(GeneralEvent::OperationCompleted { success: true, .. })
        ));

        let event2 = rx.recv().await.unwrap();
        assert_eq!(event2.log_target(), "cibox::events::build");
        assert_eq!(event2.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_emitter_without_sender_is_noop() {
        let stage = Stage { sender: None };
        stage.emit_warning("ignored", None);
        stage.emit_operation_started("ignored");
    }

    #[test]
    fn test_log_levels_follow_severity() {
        let failure = FailureContext::from_error(&BuildError::ImageBuildFailed {
            tag: "demo:v7".into(),
            exit_code: Some(1),
            output: String::new(),
        });
        let failed = AppEvent::Build(BuildEvent::Failed {
            job_id: "7".into(),
            image_tag: "demo:v7".into(),
            exit_code: Some(1),
            failure,
        });
        assert_eq!(failed.log_level(), tracing::Level::ERROR);

        let run_failed = AppEvent::Run(RunEvent::Completed {
            job_id: "7".into(),
            image_tag: "demo:v7".into(),
            exit_code: Some(3),
            success: false,
            duration: Duration::from_secs(1),
        });
        assert_eq!(run_failed.log_level(), tracing::Level::WARN);

        let output = AppEvent::Build(BuildEvent::StepOutput {
            job_id: "7".into(),
            line: "Step 1/6 : FROM travisci/php:8.1".into(),
            is_stderr: false,
        });
        assert_eq!(output.log_level(), tracing::Level::TRACE);
    }

    #[tokio::test]
    async fn test_warning_carries_context() {
        let (tx, mut rx) = channel();
        tx.emit_warning(
            "failed to remove container cibox-demo-7",
            Some("daemon not reachable".into()),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.log_level(), tracing::Level::WARN);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"]["type"], "Warning");
        assert_eq!(json["event"]["context"], "daemon not reachable");
    }

    #[test]
    fn test_failure_context_serialization() {
        let failure = FailureContext::new(None::<String>, "boom", None::<String>, false);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["message"], "boom");
        assert!(json.get("code").is_none());
        assert!(json.get("hint").is_none());
    }
}
