//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let err = Error::config("workers cannot be 0");
        assert_eq!(err.to_string(), "configuration error: workers cannot be 0");
    }

    #[test]
    fn test_error_internal() {
        let err = Error::internal("worker panicked");
        assert_eq!(err.to_string(), "internal error: worker panicked");
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::watch_failed(Path::new("/tmp/test"), "permission denied");
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
        assert_eq!(
            err.to_string(),
            "watcher error: failed to watch path '/tmp/test': permission denied"
        );
    }

    #[test]
    fn test_watcher_error_variants() {
        assert_eq!(
            WatcherError::NotADirectory("/etc/hosts".to_string()).to_string(),
            "path '/etc/hosts' is not a directory"
        );
        assert_eq!(
            WatcherError::AlreadyWatched("/srv".to_string()).to_string(),
            "path '/srv' is already watched"
        );
        assert_eq!(
            WatcherError::NotWatched("/srv".to_string()).to_string(),
            "path '/srv' is not watched"
        );
        assert_eq!(
            WatcherError::Backend("queue overflow".to_string()).to_string(),
            "event backend error: queue overflow"
        );
    }

    #[test]
    fn test_index_error_conversion() {
        let index_err = IndexError::resolve(Path::new("/data/a.bin"), "file vanished");
        let err: Error = index_err.into();
        assert!(matches!(err, Error::Index(_)));
        assert_eq!(
            err.to_string(),
            "index error: failed to resolve object id for '/data/a.bin': file vanished"
        );
    }

    #[test]
    fn test_index_error_worker_pool() {
        let err = IndexError::WorkerPool("2 worker(s) panicked".to_string());
        assert_eq!(err.to_string(), "worker pool error: 2 worker(s) panicked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::Internal("something went wrong".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Internal"));
        assert!(debug_str.contains("something went wrong"));
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<i32> {
            Err(IndexError::InvalidPath("relative/path".to_string()).into())
        }

        fn outer() -> Result<i32> {
            let _ = inner()?;
            Ok(0)
        }

        let result = outer();
        assert_eq!(
            result.unwrap_err().to_string(),
            "index error: invalid path 'relative/path'"
        );
    }
}
