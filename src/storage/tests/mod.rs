// src/storage/tests/mod.rs


// Common behaviors every storage backend must show
pub(crate) mod common {
    use std::time::{Duration, SystemTime};

    use crate::cancel::CancelToken;
    use crate::error::{LimiterError, Result};
    use crate::storage::Storage;

    // Admissions stop at the limit once the bucket is full
    pub async fn test_admission_up_to_limit<S: Storage>(storage: &S, key: &str) -> Result<()> {
        let cancel = CancelToken::new();
        let window = Duration::from_secs(1);

        for i in 0..3 {
            let now = SystemTime::now();
            let admitted = storage
                .check_and_add(&cancel, key, now - window, now, 3)
                .await?;
            assert!(admitted, "admission {} should pass", i + 1);
        }

        let now = SystemTime::now();
        let admitted = storage
            .check_and_add(&cancel, key, now - window, now, 3)
            .await?;
        assert!(!admitted, "admission past the limit should be denied");
        assert_eq!(storage.count(&cancel, key, now - window).await?, 3);

        Ok(())
    }

    // Entries behind the window start are dropped and free their slots
    pub async fn test_expired_entries_are_trimmed<S: Storage>(
        storage: &S,
        key: &str,
    ) -> Result<()> {
        let cancel = CancelToken::new();
        let window = Duration::from_millis(50);

        let now = SystemTime::now();
        assert!(
            storage
                .check_and_add(&cancel, key, now - window, now, 1)
                .await?
        );

        tokio::time::sleep(Duration::from_millis(80)).await;

        let now = SystemTime::now();
        assert!(
            storage
                .check_and_add(&cancel, key, now - window, now, 1)
                .await?,
            "slot should free up after the previous entry ages out"
        );
        assert_eq!(storage.count(&cancel, key, now - window).await?, 1);

        Ok(())
    }

    // The oldest surviving entry is reported; an empty bucket yields None
    pub async fn test_oldest_timestamp<S: Storage>(storage: &S, key: &str) -> Result<()> {
        let cancel = CancelToken::new();
        let window = Duration::from_secs(1);

        let now = SystemTime::now();
        assert_eq!(
            storage.oldest_timestamp(&cancel, key, now - window).await?,
            None
        );

        storage
            .check_and_add(&cancel, key, now - window, now, 10)
            .await?;

        let oldest = storage
            .oldest_timestamp(&cancel, key, now - window)
            .await?
            .expect("bucket should not be empty");
        assert!(oldest >= now - window);
        assert!(oldest <= SystemTime::now());

        Ok(())
    }

    // Reset purges only the named key
    pub async fn test_reset_isolation<S: Storage>(
        storage: &S,
        key_a: &str,
        key_b: &str,
    ) -> Result<()> {
        let cancel = CancelToken::new();
        let window = Duration::from_secs(1);

        let now = SystemTime::now();
        storage
            .check_and_add(&cancel, key_a, now - window, now, 10)
            .await?;
        storage
            .check_and_add(&cancel, key_b, now - window, now, 10)
            .await?;

        storage.reset_key(&cancel, key_a).await?;

        let now = SystemTime::now();
        assert_eq!(storage.count(&cancel, key_a, now - window).await?, 0);
        assert_eq!(storage.count(&cancel, key_b, now - window).await?, 1);

        Ok(())
    }

    // A fired cancellation token fails every operation
    pub async fn test_cancellation<S: Storage>(storage: &S, key: &str) -> Result<()> {
        let cancel = CancelToken::new();
        cancel.cancel();

        let now = SystemTime::now();
        let window = Duration::from_secs(1);

        let result = storage
            .check_and_add(&cancel, key, now - window, now, 1)
            .await;
        assert!(matches!(result, Err(LimiterError::Cancelled)));

        let result = storage.count(&cancel, key, now - window).await;
        assert!(matches!(result, Err(LimiterError::Cancelled)));

        let result = storage.reset_key(&cancel, key).await;
        assert!(matches!(result, Err(LimiterError::Cancelled)));

        Ok(())
    }
}
