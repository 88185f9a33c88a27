//! Optimistic package upload.
//!
//! The engine caches template packages by id. Calls first go out without the
//! package; only when the engine reports a cache miss is the same call repeated
//! once with the package attached.

use std::future::Future;

use quillwork_core::ServiceError;
use tracing::info;

/// Fault code the engine uses for a package missing from its cache.
pub const PACKAGE_NOT_FOUND_FAULT: &str = "HotDocs.Cloud.Storage.PackageNotFoundException";

/// Run `call(false)`; on a cache-miss fault, run `call(true)` exactly once.
///
/// Any other error from the first attempt is returned unchanged.
pub async fn try_without_and_with_package<T, F, Fut>(
    package_id: &str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match call(false).await {
        Err(e) if e.fault_code() == Some(PACKAGE_NOT_FOUND_FAULT) => {
            info!(package_id, "Package not cached by engine, retrying with upload");
            call(true).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn cache_miss() -> ServiceError {
        ServiceError::Fault {
            code: PACKAGE_NOT_FOUND_FAULT.into(),
            message: "package lease-v3 not found".into(),
        }
    }

    #[tokio::test]
    async fn success_is_not_retried() {
        let uploads = Mutex::new(Vec::new());
        let result = try_without_and_with_package("p", |upload| {
            uploads.lock().unwrap().push(upload);
            async { Ok::<_, ServiceError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(*uploads.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn cache_miss_retries_once_with_upload() {
        let uploads = Mutex::new(Vec::new());
        let result = try_without_and_with_package("p", |upload| {
            uploads.lock().unwrap().push(upload);
            async move {
                if upload { Ok("uploaded") } else { Err(cache_miss()) }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "uploaded");
        assert_eq!(*uploads.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn second_cache_miss_is_not_retried_again() {
        let uploads = Mutex::new(Vec::new());
        let result: Result<(), _> = try_without_and_with_package("p", |upload| {
            uploads.lock().unwrap().push(upload);
            async { Err(cache_miss()) }
        })
        .await;
        assert_eq!(result.unwrap_err().fault_code(), Some(PACKAGE_NOT_FOUND_FAULT));
        assert_eq!(uploads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_faults_propagate_without_retry() {
        let uploads = Mutex::new(Vec::new());
        let result: Result<(), _> = try_without_and_with_package("p", |upload| {
            uploads.lock().unwrap().push(upload);
            async {
                Err(ServiceError::Fault {
                    code: "HotDocs.Server.TemplateError".into(),
                    message: "bad template".into(),
                })
            }
        })
        .await;
        assert_eq!(result.unwrap_err().fault_code(), Some("HotDocs.Server.TemplateError"));
        assert_eq!(*uploads.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn network_errors_are_not_retried() {
        let calls = Mutex::new(0);
        let result: Result<(), _> = try_without_and_with_package("p", |_| {
            *calls.lock().unwrap() += 1;
            async { Err(ServiceError::Network("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Network(_))));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
