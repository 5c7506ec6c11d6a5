//! Integration tests for error types

#[cfg(test)]
mod tests {
    use cibox_errors::*;

    #[test]
    fn test_error_conversion() {
        let scan_err = ScanError::ToolUnavailable {
            program: "git".into(),
            message: "No such file or directory".into(),
        };
        let err: Error = scan_err.into();
        assert!(matches!(err, Error::Scan(_)));
        assert_eq!(err.user_code(), Some("scan.tool_unavailable"));
    }

    #[test]
    fn test_error_display() {
        let err = StagingError::CreateDir {
            path: "/tmp/cibox/demo".into(),
            message: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create directory /tmp/cibox/demo: permission denied"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = PlatformError::CommandNotFound {
            command: "docker".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                path: None,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_cancelled_is_not_retryable() {
        let err = Error::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert_eq!(err.user_code(), Some("error.cancelled"));
        assert_eq!(err.user_hint(), None);
    }

    #[test]
    fn test_listing_failure_names_directory() {
        let err: Error = ScanError::ListingFailed {
            dir: "/work/demo".into(),
            status: "exit status: 128".into(),
            diagnostic: "fatal: not a git repository".into(),
        }
        .into();
        let message = err.user_message();
        assert!(message.contains("/work/demo"));
        assert!(message.contains("not a git repository"));
        assert!(err.user_hint().is_some());
    }
}
